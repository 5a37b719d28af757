use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::AppError;

/// セッショントークンに含まれるクレーム
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    /// アカウントID
    pub user_id: Uuid,
    pub iat: i64,
    pub exp: i64,
}

/// セッショントークン（JWT, HS256）の発行・検証サービス
#[derive(Clone)]
pub struct SessionService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_secs: i64,
}

impl SessionService {
    /// 新しい SessionService を作成
    pub fn new(secret: &str, ttl_secs: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl_secs,
        }
    }

    /// アカウントIDを持つトークンを発行
    pub fn issue(&self, user_id: Uuid) -> Result<String, AppError> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let claims = SessionClaims {
            user_id,
            iat: now,
            exp: now + self.ttl_secs,
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| {
            tracing::error!(error = ?e, "トークン発行エラー");
            AppError::Internal(anyhow::anyhow!("token encode error"))
        })
    }

    /// トークンの署名と有効期限を検証し、クレームを返す
    pub fn verify(&self, token: &str) -> Result<SessionClaims, AppError> {
        decode::<SessionClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| AppError::TokenInvalid)
    }

    /// トークンとクッキーで共有するTTL（秒）
    pub fn ttl_secs(&self) -> i64 {
        self.ttl_secs
    }
}
