use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::middleware::attach_session_cookie;
use crate::services::auth::{AuthService, normalize_email};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>, // SecretBox不要（Deserialize後すぐハッシュ化）
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub success: bool,
    pub message: String,
}

/// ユーザー登録ハンドラー
///
/// POST /auth/api/register
///
/// 処理フロー:
/// 1. リクエストバリデーション
/// 2. アカウント作成（重複チェック + パスワードハッシュ化）
/// 3. セッショントークン発行 + クッキー設定（登録直後からログイン状態）
/// 4. 登録完了メールをバックグラウンド送信
///
/// # Security
/// - パスワードはログに出力しない
/// - パスワードハッシュはレスポンスに含めない
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<Response, AppError> {
    // 1. リクエストバリデーション
    let (username, email, password) = validate_register_request(&request)?;

    // 2. アカウント作成
    let auth_service = AuthService::new(state.account_store.clone());
    let account = auth_service.register(username, &email, password).await?;

    // 3. セッショントークン発行
    let token = state.session_service.issue(account.id)?;

    // 4. 登録完了メール（送信失敗しても登録は成立済み、失敗はログのみ）
    state
        .email_service
        .send_welcome_background(account.email.clone(), account.username.clone());

    let mut response = (
        StatusCode::CREATED,
        Json(RegisterResponse {
            success: true,
            message: "アカウントを作成しました".to_string(),
        }),
    )
        .into_response();

    attach_session_cookie(&mut response, &token, &state.config)?;

    Ok(response)
}

/// 登録リクエストのバリデーション
///
/// 検証済みの (username, 正規化済みemail, password) を返す
fn validate_register_request(
    request: &RegisterRequest,
) -> Result<(&str, String, &str), AppError> {
    let username = match request.username.as_deref().map(str::trim) {
        Some(username) if !username.is_empty() => username,
        _ => return Err(AppError::Validation("ユーザー名は必須です".to_string())),
    };
    if !valid_username(username) {
        return Err(AppError::Validation(
            "ユーザー名は3〜20文字の英数字とアンダースコアで入力してください".to_string(),
        ));
    }

    let email = match request.email.as_deref() {
        Some(email) => normalize_email(email),
        None => return Err(AppError::Validation("メールアドレスは必須です".to_string())),
    };
    if email.is_empty() {
        return Err(AppError::Validation("メールアドレスは必須です".to_string()));
    }
    if !valid_email(&email) {
        return Err(AppError::Validation(
            "有効なメールアドレスを入力してください".to_string(),
        ));
    }

    let password = match request.password.as_deref() {
        Some(password) if !password.is_empty() => password,
        _ => return Err(AppError::Validation("パスワードは必須です".to_string())),
    };
    if password.len() < 8 {
        return Err(AppError::Validation(
            "パスワードは8文字以上で入力してください".to_string(),
        ));
    }

    Ok((username, email, password))
}

/// ユーザー名の形式チェック（3〜20文字、英数字とアンダースコア）
fn valid_username(username: &str) -> bool {
    Regex::new(r"^[a-zA-Z0-9_]{3,20}$").is_ok_and(|regex| regex.is_match(username))
}

/// 正規化済みメールアドレスの形式チェック
fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(username: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            username: Some(username.to_string()),
            email: Some(email.to_string()),
            password: Some(password.to_string()),
        }
    }

    #[test]
    fn test_validate_missing_fields() {
        let missing_username = RegisterRequest {
            username: None,
            email: Some("test@example.com".to_string()),
            password: Some("password123".to_string()),
        };
        assert!(validate_register_request(&missing_username).is_err());

        let missing_email = RegisterRequest {
            username: Some("alice".to_string()),
            email: None,
            password: Some("password123".to_string()),
        };
        assert!(validate_register_request(&missing_email).is_err());

        let missing_password = RegisterRequest {
            username: Some("alice".to_string()),
            email: Some("test@example.com".to_string()),
            password: None,
        };
        assert!(validate_register_request(&missing_password).is_err());
    }

    #[test]
    fn test_validate_username_rules() {
        // 2文字は短すぎる
        let too_short = request("ab", "test@example.com", "password123");
        assert!(validate_register_request(&too_short).is_err());

        // 21文字は長すぎる
        let too_long = request("a23456789012345678901", "test@example.com", "password123");
        assert!(validate_register_request(&too_long).is_err());

        // 記号は使えない
        let with_hyphen = request("ali-ce", "test@example.com", "password123");
        assert!(validate_register_request(&with_hyphen).is_err());

        // アンダースコアは許可
        let with_underscore = request("ali_ce", "test@example.com", "password123");
        assert!(validate_register_request(&with_underscore).is_ok());
    }

    #[test]
    fn test_validate_invalid_email() {
        let without_at = request("alice", "invalid-email", "password123");
        assert!(validate_register_request(&without_at).is_err());

        let without_domain = request("alice", "missing-domain@", "password123");
        assert!(validate_register_request(&without_domain).is_err());
    }

    #[test]
    fn test_validate_short_password() {
        let request = request("alice", "test@example.com", "short");

        let result = validate_register_request(&request);
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_normalizes_email() {
        let (_, email, _) =
            validate_register_request(&request("alice", " Test@Example.COM ", "password123"))
                .unwrap();
        assert_eq!(email, "test@example.com");
    }

    #[test]
    fn test_validate_valid_request() {
        let request = request("alice", "test@example.com", "password123");

        let result = validate_register_request(&request);
        assert!(result.is_ok());
    }
}
