use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// アカウントレコード
///
/// OTP関連フィールドは各フローの中でのみ変化する。
/// 消費・期限切れ・試行回数超過の時点で必ずクリアされ、
/// 古いOTP素材が有効なまま残ることはない。
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Account {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub is_verified: bool,
    /// メール確認用OTPのargon2ハッシュ（未発行時はNULL）
    #[serde(skip)]
    pub verify_otp_hash: Option<String>,
    #[serde(skip)]
    pub verify_otp_expires_at: Option<OffsetDateTime>,
    /// パスワードリセット用OTPのargon2ハッシュ（未発行時はNULL）
    #[serde(skip)]
    pub reset_otp_hash: Option<String>,
    #[serde(skip)]
    pub reset_otp_expires_at: Option<OffsetDateTime>,
    /// リセットOTPの検証失敗回数（新規発行でリセット）
    #[serde(skip)]
    pub reset_otp_attempts: i32,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// API応答用のアカウント情報（公開可能なフィールドのみ）
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountProjection {
    pub id: Uuid,
    pub name: String,
    pub is_account_verified: bool,
}

impl From<&Account> for AccountProjection {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            name: account.username.clone(),
            is_account_verified: account.is_verified,
        }
    }
}
