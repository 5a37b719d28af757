use std::sync::Arc;

use secrecy::ExposeSecret;
use sqlx::PgPool;

use crate::config::Config;
use crate::repositories::PgAccountStore;
use crate::services::{EmailService, SessionService};

/// アプリケーション共有状態
///
/// axum の State として全ハンドラーで共有される。
/// Clone は必須（axum が内部で clone するため）。
#[derive(Clone)]
pub struct AppState {
    /// アプリケーション設定（Arc で共有）
    pub config: Arc<Config>,
    /// アカウントストア
    pub account_store: Arc<PgAccountStore>,
    /// メールサービス
    pub email_service: EmailService,
    /// セッショントークンサービス
    pub session_service: SessionService,
}

impl AppState {
    /// 新しい AppState を作成
    pub fn new(db_pool: PgPool, config: Config) -> Self {
        let config = Arc::new(config);
        let account_store = Arc::new(PgAccountStore::new(db_pool));
        let email_service = EmailService::new(config.clone());
        let session_service =
            SessionService::new(config.jwt_secret.expose_secret(), config.session_ttl_secs);

        Self {
            config,
            account_store,
            email_service,
            session_service,
        }
    }
}
