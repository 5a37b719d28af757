use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::middleware::attach_session_cookie;
use crate::services::auth::AuthService;
use crate::state::AppState;

/// ログインリクエスト
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// ユーザーのメールアドレス
    #[serde(default)]
    pub email: Option<String>,
    /// ユーザーのパスワード
    #[serde(default)]
    pub password: Option<String>,
}

/// ログインレスポンス
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub message: String,
}

/// ログインハンドラー
///
/// POST /auth/api/login
///
/// 処理フロー:
/// 1. リクエストバリデーション
/// 2. ユーザー認証（DB照合）
/// 3. セッショントークン発行 + クッキー設定
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Response, AppError> {
    // 1. リクエストバリデーション
    let (email, password) = validate_login_request(&request)?;

    // 2. ユーザー認証（DB照合）
    let auth_service = AuthService::new(state.account_store.clone());
    let account = auth_service.authenticate(email, password).await?;

    // 3. セッショントークン発行
    let token = state.session_service.issue(account.id)?;

    tracing::info!(account_id = %account.id, "ログイン成功");

    let mut response = (
        StatusCode::OK,
        Json(LoginResponse {
            success: true,
            message: "ログインしました".to_string(),
        }),
    )
        .into_response();

    attach_session_cookie(&mut response, &token, &state.config)?;

    Ok(response)
}

/// ログインリクエストのバリデーション
///
/// パスワードは存在チェックのみ。誤ったパスワードの扱いは認証側に任せる。
fn validate_login_request(request: &LoginRequest) -> Result<(&str, &str), AppError> {
    // email: 必須、メール形式
    let email = match request.email.as_deref() {
        Some(email) if !email.trim().is_empty() => email,
        _ => return Err(AppError::Validation("メールアドレスは必須です".to_string())),
    };

    // 簡易的なメール形式チェック（@ が含まれているか）
    if !email.contains('@') {
        return Err(AppError::Validation(
            "有効なメールアドレスを入力してください".to_string(),
        ));
    }

    // password: 必須
    let password = match request.password.as_deref() {
        Some(password) if !password.is_empty() => password,
        _ => return Err(AppError::Validation("パスワードは必須です".to_string())),
    };

    Ok((email, password))
}
