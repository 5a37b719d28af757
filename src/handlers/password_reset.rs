use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::services::PasswordResetService;
use crate::state::AppState;

/// リセットコード送信リクエスト
#[derive(Debug, Deserialize)]
pub struct RequestResetOtpRequest {
    /// パスワードを忘れたアカウントのメールアドレス
    #[serde(default)]
    pub email: Option<String>,
}

/// リセットコード送信レスポンス
#[derive(Debug, Serialize)]
pub struct RequestResetOtpResponse {
    pub success: bool,
    pub message: String,
}

/// パスワード再設定リクエスト
#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    #[serde(default)]
    pub email: Option<String>,
    /// メールで届いた6桁のリセットコード
    #[serde(default)]
    pub otp: Option<String>,
    #[serde(default, rename = "newPassword")]
    pub new_password: Option<String>,
}

/// パスワード再設定レスポンス
#[derive(Debug, Serialize)]
pub struct ResetPasswordResponse {
    pub success: bool,
    pub message: String,
}

/// リセットコード送信ハンドラー
///
/// POST /auth/api/reset-otp
///
/// 指定メールアドレスのアカウントにリセット用OTPを発行してメール送信する。
/// 再リクエストで前のコードは無効になり、失敗回数もリセットされる。
pub async fn request_reset_otp(
    State(state): State<AppState>,
    Json(request): Json<RequestResetOtpRequest>,
) -> Result<Json<RequestResetOtpResponse>, AppError> {
    // 1. リクエストバリデーション
    let email = validate_request_reset_otp(&request)?;

    // 2. OTP発行 + メール送信
    let reset_service = PasswordResetService::new(
        state.account_store.clone(),
        state.email_service.clone(),
        state.config.otp_ttl_secs,
    );

    reset_service.request_otp(email).await?;

    Ok(Json(RequestResetOtpResponse {
        success: true,
        message: "パスワード再設定用のコードをメールで送信しました".to_string(),
    }))
}

/// パスワード再設定ハンドラー
///
/// POST /auth/api/password-reset
///
/// 処理フロー:
/// 1. リクエストバリデーション
/// 2. リセットOTPの状態遷移（期限・回数・照合）
/// 3. パスワード更新 + リセット状態クリア
pub async fn reset_password(
    State(state): State<AppState>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<(StatusCode, Json<ResetPasswordResponse>), AppError> {
    // 1. リクエストバリデーション
    let (email, otp, new_password) = validate_reset_password_request(&request)?;

    // 2-3. 状態遷移とパスワード更新
    let reset_service = PasswordResetService::new(
        state.account_store.clone(),
        state.email_service.clone(),
        state.config.otp_ttl_secs,
    );

    reset_service.reset_password(email, otp, new_password).await?;

    Ok((
        StatusCode::CREATED,
        Json(ResetPasswordResponse {
            success: true,
            message: "パスワードを再設定しました".to_string(),
        }),
    ))
}

/// リセットコード送信リクエストのバリデーション
fn validate_request_reset_otp(request: &RequestResetOtpRequest) -> Result<&str, AppError> {
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

    Ok(email)
}

/// パスワード再設定リクエストのバリデーション
///
/// 検証済みの (email, otp, new_password) を返す。
/// OTPの形式チェックはしない。桁数違いはコード不一致として扱う。
fn validate_reset_password_request(
    request: &ResetPasswordRequest,
) -> Result<(&str, &str, &str), AppError> {
    // email: 必須、メール形式
    let email = match request.email.as_deref() {
        Some(email) if !email.trim().is_empty() => email,
        _ => return Err(AppError::Validation("メールアドレスは必須です".to_string())),
    };
    if !email.contains('@') {
        return Err(AppError::Validation(
            "有効なメールアドレスを入力してください".to_string(),
        ));
    }

    // otp: 必須
    let otp = match request.otp.as_deref() {
        Some(otp) if !otp.trim().is_empty() => otp,
        _ => return Err(AppError::Validation("リセットコードは必須です".to_string())),
    };

    // newPassword: 必須、8文字以上
    let new_password = match request.new_password.as_deref() {
        Some(new_password) if !new_password.is_empty() => new_password,
        _ => {
            return Err(AppError::Validation(
                "新しいパスワードは必須です".to_string(),
            ));
        }
    };
    if new_password.len() < 8 {
        return Err(AppError::Validation(
            "パスワードは8文字以上で入力してください".to_string(),
        ));
    }

    Ok((email, otp, new_password))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_request_missing_email() {
        let request = RequestResetOtpRequest { email: None };

        let result = validate_request_reset_otp(&request);
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_request_invalid_email() {
        let request = RequestResetOtpRequest {
            email: Some("invalid-email".to_string()),
        };

        let result = validate_request_reset_otp(&request);
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_request_valid_email() {
        let request = RequestResetOtpRequest {
            email: Some("test@example.com".to_string()),
        };

        assert_eq!(
            validate_request_reset_otp(&request).unwrap(),
            "test@example.com"
        );
    }

    #[test]
    fn test_validate_reset_missing_fields() {
        let missing_email = ResetPasswordRequest {
            email: None,
            otp: Some("123456".to_string()),
            new_password: Some("password123".to_string()),
        };
        assert!(validate_reset_password_request(&missing_email).is_err());

        let missing_otp = ResetPasswordRequest {
            email: Some("test@example.com".to_string()),
            otp: None,
            new_password: Some("password123".to_string()),
        };
        assert!(validate_reset_password_request(&missing_otp).is_err());

        let missing_password = ResetPasswordRequest {
            email: Some("test@example.com".to_string()),
            otp: Some("123456".to_string()),
            new_password: None,
        };
        assert!(validate_reset_password_request(&missing_password).is_err());
    }

    #[test]
    fn test_validate_reset_short_new_password() {
        let request = ResetPasswordRequest {
            email: Some("test@example.com".to_string()),
            otp: Some("123456".to_string()),
            new_password: Some("short".to_string()),
        };

        let result = validate_reset_password_request(&request);
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_reset_valid_request() {
        let request = ResetPasswordRequest {
            email: Some("test@example.com".to_string()),
            otp: Some("123456".to_string()),
            new_password: Some("password123".to_string()),
        };

        let (email, otp, new_password) = validate_reset_password_request(&request).unwrap();
        assert_eq!(email, "test@example.com");
        assert_eq!(otp, "123456");
        assert_eq!(new_password, "password123");
    }
}
