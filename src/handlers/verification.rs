use axum::{Extension, Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::middleware::AuthAccount;
use crate::services::EmailVerificationService;
use crate::state::AppState;

/// メール確認コード送信レスポンス
#[derive(Debug, Serialize)]
pub struct SendOtpResponse {
    pub success: bool,
    pub message: String,
}

/// メール確認リクエスト
#[derive(Debug, Deserialize)]
pub struct VerifyEmailRequest {
    /// メールで届いた6桁の確認コード
    #[serde(default)]
    pub otp: Option<String>,
}

/// メール確認レスポンス
#[derive(Debug, Serialize)]
pub struct VerifyEmailResponse {
    pub success: bool,
    pub message: String,
}

/// メール確認コード送信ハンドラー
///
/// POST /auth/api/send-otp （要認証）
///
/// ログイン中のアカウントに対して確認用OTPを発行し、メールで送信する。
/// 再送すると前のコードは無効になる。
pub async fn send_verify_otp(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthAccount>,
) -> Result<(StatusCode, Json<SendOtpResponse>), AppError> {
    let verification_service = EmailVerificationService::new(
        state.account_store.clone(),
        state.email_service.clone(),
        state.config.otp_ttl_secs,
    );

    verification_service.send_otp(auth.account_id).await?;

    Ok((
        StatusCode::CREATED,
        Json(SendOtpResponse {
            success: true,
            message: "確認コードをメールで送信しました".to_string(),
        }),
    ))
}

/// メール確認ハンドラー
///
/// POST /auth/api/email-verification （要認証）
///
/// 処理フロー:
/// 1. リクエストバリデーション
/// 2. OTP照合 + 期限チェック
/// 3. アカウントを確認済みに更新
pub async fn verify_email(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthAccount>,
    Json(request): Json<VerifyEmailRequest>,
) -> Result<Json<VerifyEmailResponse>, AppError> {
    // 1. リクエストバリデーション
    let otp = validate_verify_email_request(&request)?;

    // 2-3. OTP照合と確認済み更新
    let verification_service = EmailVerificationService::new(
        state.account_store.clone(),
        state.email_service.clone(),
        state.config.otp_ttl_secs,
    );

    verification_service.verify(auth.account_id, otp).await?;

    Ok(Json(VerifyEmailResponse {
        success: true,
        message: "メールアドレスを確認しました".to_string(),
    }))
}

/// メール確認リクエストのバリデーション
///
/// 形式チェックはしない。桁数違いなどはコード不一致として扱う。
fn validate_verify_email_request(request: &VerifyEmailRequest) -> Result<&str, AppError> {
    match request.otp.as_deref() {
        Some(otp) if !otp.trim().is_empty() => Ok(otp),
        _ => Err(AppError::Validation("確認コードは必須です".to_string())),
    }
}
