use secrecy::SecretBox;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub database_url: SecretBox<String>,
    /// セッショントークン署名用シークレット
    pub jwt_secret: SecretBox<String>,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,

    /// 実行環境（"production" で Secure / SameSite=Strict クッキーに切替）
    #[serde(default = "default_environment")]
    pub environment: String,

    // セッション設定
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: i64,

    // OTP設定（メール確認・パスワードリセット共通）
    #[serde(default = "default_otp_ttl_secs")]
    pub otp_ttl_secs: i64,

    /// SPA のオリジン（設定時のみ CORS + クッキー送信を許可）
    #[serde(default)]
    pub cors_origin: Option<String>,

    // SMTP設定（オプション - email機能有効時のみ使用）
    #[serde(default)]
    pub smtp_host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub smtp_username: Option<SecretBox<String>>,
    #[serde(default)]
    pub smtp_password: Option<SecretBox<String>>,
    #[serde(default)]
    pub smtp_from_address: Option<String>,
}

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_ENVIRONMENT: &str = "development";
const DEFAULT_SESSION_TTL_SECS: i64 = 86400;
const DEFAULT_OTP_TTL_SECS: i64 = 600;
const DEFAULT_SMTP_PORT: u16 = 587;

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_environment() -> String {
    DEFAULT_ENVIRONMENT.to_string()
}

fn default_session_ttl_secs() -> i64 {
    DEFAULT_SESSION_TTL_SECS
}

fn default_otp_ttl_secs() -> i64 {
    DEFAULT_OTP_TTL_SECS
}

fn default_smtp_port() -> u16 {
    DEFAULT_SMTP_PORT
}

impl Config {
    pub fn load() -> Result<Self, envy::Error> {
        envy::from_env()
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// クッキーの Secure フラグ（本番環境のみ有効）
    pub fn cookie_secure(&self) -> bool {
        self.is_production()
    }

    /// クッキーの SameSite 属性
    ///
    /// 本番: Strict / 開発: None（別オリジンの SPA からの送信を許可）
    pub fn cookie_same_site(&self) -> &'static str {
        if self.is_production() { "Strict" } else { "None" }
    }
}

/// テスト用の設定（環境変数に依存しない）
#[cfg(test)]
pub fn test_config() -> Config {
    Config {
        database_url: SecretBox::new(Box::new(
            "postgres://localhost/oxauth_test".to_string(),
        )),
        jwt_secret: SecretBox::new(Box::new("test_jwt_secret".to_string())),
        host: DEFAULT_HOST.to_string(),
        port: DEFAULT_PORT,
        environment: DEFAULT_ENVIRONMENT.to_string(),
        session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
        otp_ttl_secs: DEFAULT_OTP_TTL_SECS,
        cors_origin: None,
        smtp_host: None,
        smtp_port: DEFAULT_SMTP_PORT,
        smtp_username: None,
        smtp_password: None,
        smtp_from_address: None,
    }
}
