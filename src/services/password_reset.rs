use std::sync::Arc;

use time::{Duration, OffsetDateTime};

use crate::error::AppError;
use crate::repositories::AccountStore;
use crate::services::EmailService;
use crate::services::auth::{hash_password, normalize_email, verify_password};
use crate::services::otp::{MAX_RESET_ATTEMPTS, generate_otp};

/// パスワードリセットサービス
///
/// リセットサイクル: OTP発行 → 検証（失敗は回数制限つき）→ パスワード更新。
/// 消費・期限切れ・回数超過のいずれでもサイクルは終了し、
/// OTP状態は完全にクリアされる（再利用不可）。
pub struct PasswordResetService<S> {
    store: Arc<S>,
    email_service: EmailService,
    otp_ttl_secs: i64,
}

impl<S: AccountStore> PasswordResetService<S> {
    /// 新しい PasswordResetService を作成
    pub fn new(store: Arc<S>, email_service: EmailService, otp_ttl_secs: i64) -> Self {
        Self {
            store,
            email_service,
            otp_ttl_secs,
        }
    }

    /// リセット用OTPを発行してメール送信
    ///
    /// 既存のリセットサイクルは新しいもので置き換えられる（試行回数も0に戻る）。
    pub async fn request_otp(&self, email: &str) -> Result<(), AppError> {
        let email = normalize_email(email);

        let account = match self.store.find_by_email(&email).await? {
            Some(account) => account,
            None => {
                tracing::warn!("リセットコード発行失敗: ユーザー不在");
                return Err(AppError::ResetAccountNotFound);
            }
        };

        let otp = generate_otp();
        let otp_hash = hash_password(&otp)?;
        let expires_at = OffsetDateTime::now_utc() + Duration::seconds(self.otp_ttl_secs);

        self.store
            .set_reset_otp(account.id, &otp_hash, expires_at)
            .await?;

        // メール送信はバックグラウンド（失敗してもサイクルは成立している）
        self.email_service
            .send_reset_otp_background(account.email, otp);

        tracing::info!(account_id = %account.id, "リセットコード発行");

        Ok(())
    }

    /// OTPを検証してパスワードを更新する
    ///
    /// 各分岐は終端。順序は固定:
    /// 未発行 → 期限切れ → 回数超過 → 不一致 → パスワード再利用 → 成功。
    /// 上限チェックはインクリメントの前なので、4回目の失敗呼び出しで
    /// 429になる（正しいOTPを提示しても同じ）。
    pub async fn reset_password(
        &self,
        email: &str,
        otp: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        let email = normalize_email(email);

        // アカウント不在とリセット未発行は同じエラー
        let account = match self.store.find_by_email(&email).await? {
            Some(account) => account,
            None => {
                tracing::warn!("パスワードリセット失敗: ユーザー不在");
                return Err(AppError::ResetOtpNotRequested);
            }
        };

        let (stored_hash, cycle_expires_at) =
            match (&account.reset_otp_hash, account.reset_otp_expires_at) {
                (Some(hash), Some(expires_at)) if !hash.is_empty() => (hash.clone(), expires_at),
                _ => {
                    tracing::warn!(account_id = %account.id, "パスワードリセット失敗: リセット未発行");
                    return Err(AppError::ResetOtpNotRequested);
                }
            };

        // 期限切れ: サイクルを破棄して終了
        if cycle_expires_at < OffsetDateTime::now_utc() {
            self.store.clear_reset_otp(account.id).await?;
            tracing::warn!(account_id = %account.id, "パスワードリセット失敗: コード期限切れ");
            return Err(AppError::ResetOtpExpired);
        }

        // 回数超過: サイクルを破棄して終了（新しいOTPの発行が必要）
        if account.reset_otp_attempts >= MAX_RESET_ATTEMPTS {
            self.store.clear_reset_otp(account.id).await?;
            tracing::warn!(account_id = %account.id, "パスワードリセット失敗: 試行回数超過");
            return Err(AppError::TooManyAttempts);
        }

        // 不一致: 条件付きインクリメント（並行リクエストでも上限を超えない）
        if !verify_password(otp, &stored_hash)? {
            let attempts = self
                .store
                .increment_reset_attempts(account.id, cycle_expires_at, MAX_RESET_ATTEMPTS)
                .await?;
            match attempts {
                Some(attempts) => {
                    tracing::warn!(account_id = %account.id, attempts, "パスワードリセット失敗: コード不一致");
                }
                None => {
                    // 並行リクエストがサイクルを進めた/置き換えた場合。カウンタは動かさない
                    tracing::warn!(account_id = %account.id, "パスワードリセット失敗: コード不一致（サイクル変更済み）");
                }
            }
            return Err(AppError::ResetOtpInvalid);
        }

        // 現在のパスワードと同一なら拒否（状態は一切変更しない）
        if verify_password(new_password, &account.password_hash)? {
            tracing::warn!(account_id = %account.id, "パスワードリセット失敗: パスワード再利用");
            return Err(AppError::PasswordReused);
        }

        // パスワード更新とサイクル破棄を単一更新で行う
        let new_password_hash = hash_password(new_password)?;
        self.store
            .update_password_and_clear_reset(account.id, &new_password_hash)
            .await?;

        tracing::info!(account_id = %account.id, "パスワードリセット完了");

        Ok(())
    }
}
