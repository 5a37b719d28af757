use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("認証エラー: {0}")]
    Authentication(String),

    #[error("バリデーションエラー: {0}")]
    Validation(String),

    #[error("トークンが提供されていません")]
    TokenMissing,

    #[error("無効または期限切れのトークンです")]
    TokenInvalid,

    #[error("このユーザー名またはメールアドレスは既に使用されています")]
    AccountAlreadyExists,

    #[error("ユーザーが見つかりません")]
    AccountNotFound,

    #[error("アカウントは既に確認済みです")]
    AlreadyVerified,

    #[error("確認コードが無効です")]
    VerifyOtpInvalid,

    #[error("確認コードが期限切れです")]
    VerifyOtpExpired,

    #[error("リセット対象のユーザーが見つかりません")]
    ResetAccountNotFound,

    #[error("リセットコードが発行されていません")]
    ResetOtpNotRequested,

    #[error("リセットコードが期限切れです")]
    ResetOtpExpired,

    #[error("リセットコードが無効です")]
    ResetOtpInvalid,

    #[error("リセットコードの試行回数超過")]
    TooManyAttempts,

    #[error("新しいパスワードが現在のパスワードと同一です")]
    PasswordReused,

    #[error("データベースエラー")]
    Database(#[from] sqlx::Error),

    #[error("内部エラー")]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::Authentication(_) => (
                StatusCode::FORBIDDEN,
                "メールアドレスまたはパスワードが正しくありません".to_string(),
            ),
            Self::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::TokenMissing => (
                StatusCode::FORBIDDEN,
                "認証が必要です。ログインしてください".to_string(),
            ),
            Self::TokenInvalid => (
                StatusCode::FORBIDDEN,
                "無効または期限切れのトークンです。再度ログインしてください".to_string(),
            ),
            Self::AccountAlreadyExists => (
                StatusCode::CONFLICT,
                "このユーザー名またはメールアドレスは既に使用されています".to_string(),
            ),
            Self::AccountNotFound => {
                (StatusCode::NOT_FOUND, "ユーザーが見つかりません".to_string())
            }
            Self::AlreadyVerified => (
                StatusCode::BAD_REQUEST,
                "アカウントは既に確認済みです".to_string(),
            ),
            Self::VerifyOtpInvalid => (
                StatusCode::UNAUTHORIZED,
                "確認コードが正しくありません".to_string(),
            ),
            Self::VerifyOtpExpired => (
                StatusCode::UNAUTHORIZED,
                "確認コードの有効期限が切れています。新しいコードを発行してください".to_string(),
            ),
            Self::ResetAccountNotFound => {
                (StatusCode::BAD_REQUEST, "ユーザーが見つかりません".to_string())
            }
            Self::ResetOtpNotRequested => (
                StatusCode::BAD_REQUEST,
                "リセットコードが発行されていません".to_string(),
            ),
            Self::ResetOtpExpired => (
                StatusCode::BAD_REQUEST,
                "リセットコードの有効期限が切れています。新しいコードを発行してください"
                    .to_string(),
            ),
            Self::ResetOtpInvalid => (
                StatusCode::BAD_REQUEST,
                "リセットコードが正しくありません".to_string(),
            ),
            Self::TooManyAttempts => (
                StatusCode::TOO_MANY_REQUESTS,
                "試行回数の上限に達しました。新しいリセットコードを発行してください".to_string(),
            ),
            Self::PasswordReused => (
                StatusCode::BAD_REQUEST,
                "新しいパスワードは現在のパスワードと異なるものにしてください".to_string(),
            ),
            Self::Database(e) => {
                tracing::error!(error = ?e, "データベースエラー");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "内部エラーが発生しました".to_string(),
                )
            }
            Self::Internal(e) => {
                tracing::error!(error = ?e, "内部エラー");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "内部エラーが発生しました".to_string(),
                )
            }
        };

        (
            status,
            Json(ErrorResponse {
                success: false,
                message,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(error: AppError) -> StatusCode {
        error.into_response().status()
    }

    #[test]
    fn test_authentication_is_403() {
        let status = status_of(AppError::Authentication("invalid_credentials".to_string()));
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_token_errors_are_403() {
        assert_eq!(status_of(AppError::TokenMissing), StatusCode::FORBIDDEN);
        assert_eq!(status_of(AppError::TokenInvalid), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_validation_is_400() {
        let status = status_of(AppError::Validation("入力エラー".to_string()));
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_conflict_is_409() {
        assert_eq!(status_of(AppError::AccountAlreadyExists), StatusCode::CONFLICT);
    }

    #[test]
    fn test_verify_otp_errors_are_401() {
        assert_eq!(status_of(AppError::VerifyOtpInvalid), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(AppError::VerifyOtpExpired), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_reset_otp_errors_are_400() {
        // リセット系エンドポイントの契約には404が無いため、全て400で返す
        assert_eq!(
            status_of(AppError::ResetAccountNotFound),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(AppError::ResetOtpNotRequested),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(AppError::ResetOtpExpired), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(AppError::ResetOtpInvalid), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_too_many_attempts_is_429() {
        assert_eq!(
            status_of(AppError::TooManyAttempts),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[test]
    fn test_password_reused_is_400() {
        assert_eq!(status_of(AppError::PasswordReused), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_account_not_found_is_404() {
        assert_eq!(status_of(AppError::AccountNotFound), StatusCode::NOT_FOUND);
    }
}
