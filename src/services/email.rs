use std::sync::Arc;

use crate::config::Config;
use crate::error::AppError;

/// メール送信サービス
///
/// `email` フィーチャ有効時は lettre でSMTP送信を行う。
/// 無効時は開発モードとしてログ出力のみ（OTPはログで確認できる）。
#[derive(Clone)]
pub struct EmailService {
    config: Arc<Config>,
}

impl EmailService {
    /// 新しい EmailService を作成
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    /// 登録完了メールを送信
    pub async fn send_welcome(&self, to: &str, username: &str) -> Result<(), AppError> {
        let body = format!(
            "{username} さん\n\nアカウントが作成されました。\n登録メールアドレス: {to}"
        );
        self.send(to, "アカウント登録完了", &body).await
    }

    /// メールアドレス確認用OTPを送信
    pub async fn send_verify_otp(&self, to: &str, otp: &str) -> Result<(), AppError> {
        let body = format!(
            "メールアドレス確認コード: {otp}\n有効期限は{}分です。",
            self.config.otp_ttl_secs / 60
        );
        self.send(to, "メールアドレス確認コード", &body).await
    }

    /// パスワードリセット用OTPを送信
    pub async fn send_reset_otp(&self, to: &str, otp: &str) -> Result<(), AppError> {
        let body = format!(
            "パスワードリセットコード: {otp}\n有効期限は{}分です。",
            self.config.otp_ttl_secs / 60
        );
        self.send(to, "パスワードリセットコード", &body).await
    }

    /// 登録完了メールをバックグラウンドで送信
    ///
    /// 送信失敗はログのみ。アカウント作成済みのレスポンスを妨げない。
    pub fn send_welcome_background(&self, to: String, username: String) {
        let service = self.clone();
        tokio::spawn(async move {
            if let Err(e) = service.send_welcome(&to, &username).await {
                tracing::warn!(error = ?e, to = %to, "登録完了メールの送信に失敗");
            }
        });
    }

    /// メールアドレス確認用OTPをバックグラウンドで送信
    pub fn send_verify_otp_background(&self, to: String, otp: String) {
        let service = self.clone();
        tokio::spawn(async move {
            if let Err(e) = service.send_verify_otp(&to, &otp).await {
                tracing::warn!(error = ?e, to = %to, "確認コードメールの送信に失敗");
            }
        });
    }

    /// パスワードリセット用OTPをバックグラウンドで送信
    pub fn send_reset_otp_background(&self, to: String, otp: String) {
        let service = self.clone();
        tokio::spawn(async move {
            if let Err(e) = service.send_reset_otp(&to, &otp).await {
                tracing::warn!(error = ?e, to = %to, "リセットコードメールの送信に失敗");
            }
        });
    }

    /// 開発モード: メール送信せずログ出力のみ
    #[cfg(not(feature = "email"))]
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), AppError> {
        tracing::info!(to = %to, subject = %subject, "メール送信（開発モード）");
        tracing::info!("本文: {}", body);
        Ok(())
    }

    #[cfg(feature = "email")]
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), AppError> {
        use lettre::message::Mailbox;
        use lettre::transport::smtp::authentication::Credentials;
        use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
        use secrecy::ExposeSecret;

        let (host, username, password, from) = match (
            &self.config.smtp_host,
            &self.config.smtp_username,
            &self.config.smtp_password,
            &self.config.smtp_from_address,
        ) {
            (Some(host), Some(username), Some(password), Some(from)) => {
                (host, username, password, from)
            }
            _ => {
                tracing::error!("SMTP設定が不足しています");
                return Err(AppError::Internal(anyhow::anyhow!("smtp config missing")));
            }
        };

        let from_mailbox: Mailbox = from.parse().map_err(|e| {
            tracing::error!(error = ?e, "送信元アドレスのパースに失敗");
            AppError::Internal(anyhow::anyhow!("invalid from address"))
        })?;
        let to_mailbox: Mailbox = to.parse().map_err(|e| {
            tracing::error!(error = ?e, "宛先アドレスのパースに失敗");
            AppError::Internal(anyhow::anyhow!("invalid to address"))
        })?;

        let message = Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(subject)
            .body(body.to_string())
            .map_err(|e| {
                tracing::error!(error = ?e, "メールの構築に失敗");
                AppError::Internal(anyhow::anyhow!("message build error"))
            })?;

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(host)
            .map_err(|e| {
                tracing::error!(error = ?e, "SMTPトランスポートの構築に失敗");
                AppError::Internal(anyhow::anyhow!("smtp transport error"))
            })?
            .port(self.config.smtp_port)
            .credentials(Credentials::new(
                username.expose_secret().clone(),
                password.expose_secret().clone(),
            ))
            .build();

        mailer.send(message).await.map_err(|e| {
            tracing::error!(error = ?e, "メール送信に失敗");
            AppError::Internal(anyhow::anyhow!("mail send error"))
        })?;

        tracing::info!(to = %to, subject = %subject, "メール送信完了");
        Ok(())
    }
}
