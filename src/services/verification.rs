use std::sync::Arc;

use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::error::AppError;
use crate::repositories::AccountStore;
use crate::services::EmailService;
use crate::services::auth::{hash_password, verify_password};
use crate::services::otp::generate_otp;

/// メールアドレス確認サービス
///
/// 6桁OTPの発行と検証を行う。OTPはパスワードと同じargon2で
/// ハッシュ化して保存し、平文は送信メールにのみ現れる。
pub struct EmailVerificationService<S> {
    store: Arc<S>,
    email_service: EmailService,
    otp_ttl_secs: i64,
}

impl<S: AccountStore> EmailVerificationService<S> {
    /// 新しい EmailVerificationService を作成
    pub fn new(store: Arc<S>, email_service: EmailService, otp_ttl_secs: i64) -> Self {
        Self {
            store,
            email_service,
            otp_ttl_secs,
        }
    }

    /// 確認用OTPを発行してメール送信
    ///
    /// 再発行すると前のOTPは無効になる（値と期限を上書き）。
    pub async fn send_otp(&self, account_id: Uuid) -> Result<(), AppError> {
        // セッション検証後にアカウントが消えた場合は内部エラー扱い
        // （このエンドポイントの契約に404は無い）
        let account = self
            .store
            .find_by_id(account_id)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("account missing for otp send")))?;

        if account.is_verified {
            return Err(AppError::AlreadyVerified);
        }

        let otp = generate_otp();
        let otp_hash = hash_password(&otp)?;
        let expires_at = OffsetDateTime::now_utc() + Duration::seconds(self.otp_ttl_secs);

        self.store
            .set_verify_otp(account.id, &otp_hash, expires_at)
            .await?;

        // メール送信はバックグラウンド（失敗してもOTP発行は成立している）
        self.email_service
            .send_verify_otp_background(account.email, otp);

        tracing::info!(account_id = %account.id, "確認コード発行");

        Ok(())
    }

    /// 提示されたOTPを検証してアカウントを確認済みにする
    pub async fn verify(&self, account_id: Uuid, otp: &str) -> Result<(), AppError> {
        let account = self
            .store
            .find_by_id(account_id)
            .await?
            .ok_or(AppError::AccountNotFound)?;

        if account.is_verified {
            return Err(AppError::AlreadyVerified);
        }

        // 不一致チェックは期限チェックより先（未発行も不一致と同じ扱い）
        let stored_hash = match &account.verify_otp_hash {
            Some(hash) if !hash.is_empty() => hash,
            _ => {
                tracing::warn!(account_id = %account.id, "メール確認失敗: コード未発行");
                return Err(AppError::VerifyOtpInvalid);
            }
        };

        if !verify_password(otp, stored_hash)? {
            tracing::warn!(account_id = %account.id, "メール確認失敗: コード不一致");
            return Err(AppError::VerifyOtpInvalid);
        }

        // 期限切れを検知した時点でOTP状態を破棄する（再利用防止）
        match account.verify_otp_expires_at {
            Some(expires_at) if expires_at >= OffsetDateTime::now_utc() => {}
            _ => {
                self.store.clear_verify_otp(account.id).await?;
                tracing::warn!(account_id = %account.id, "メール確認失敗: コード期限切れ");
                return Err(AppError::VerifyOtpExpired);
            }
        }

        // 確認済みフラグとOTPクリアを単一更新で行う
        self.store.mark_verified(account.id).await?;

        tracing::info!(account_id = %account.id, "メールアドレス確認完了");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use crate::repositories::MemoryAccountStore;

    fn service_with_store() -> (
        EmailVerificationService<MemoryAccountStore>,
        Arc<MemoryAccountStore>,
    ) {
        let store = Arc::new(MemoryAccountStore::new());
        let email_service = EmailService::new(Arc::new(test_config()));
        (
            EmailVerificationService::new(store.clone(), email_service, 600),
            store,
        )
    }

    async fn seed_account(store: &MemoryAccountStore) -> Uuid {
        store
            .create("alice", "alice@example.com", "password-hash")
            .await
            .unwrap()
            .id
    }

    async fn seed_otp(store: &MemoryAccountStore, id: Uuid, otp: &str, expires_in_secs: i64) {
        let otp_hash = hash_password(otp).unwrap();
        let expires_at = OffsetDateTime::now_utc() + Duration::seconds(expires_in_secs);
        store.set_verify_otp(id, &otp_hash, expires_at).await.unwrap();
    }

    #[tokio::test]
    async fn test_send_otp_sets_state() {
        let (service, store) = service_with_store();
        let id = seed_account(&store).await;

        service.send_otp(id).await.unwrap();

        let account = store.find_by_id(id).await.unwrap().unwrap();
        assert!(account.verify_otp_hash.is_some());
        assert!(account.verify_otp_expires_at.unwrap() > OffsetDateTime::now_utc());
    }

    #[tokio::test]
    async fn test_send_otp_already_verified() {
        let (service, store) = service_with_store();
        let id = seed_account(&store).await;
        store.mark_verified(id).await.unwrap();

        let result = service.send_otp(id).await;
        assert!(matches!(result, Err(AppError::AlreadyVerified)));
    }

    #[tokio::test]
    async fn test_send_otp_missing_account_is_internal() {
        let (service, _store) = service_with_store();

        let result = service.send_otp(Uuid::new_v4()).await;
        assert!(matches!(result, Err(AppError::Internal(_))));
    }

    #[tokio::test]
    async fn test_reissue_invalidates_previous_otp() {
        let (service, store) = service_with_store();
        let id = seed_account(&store).await;
        seed_otp(&store, id, "111111", 600).await;

        // 再発行で前のコードは無効になる
        service.send_otp(id).await.unwrap();

        let result = service.verify(id, "111111").await;
        assert!(matches!(result, Err(AppError::VerifyOtpInvalid)));
    }

    #[tokio::test]
    async fn test_verify_success_marks_and_clears() {
        let (service, store) = service_with_store();
        let id = seed_account(&store).await;
        seed_otp(&store, id, "222222", 600).await;

        service.verify(id, "222222").await.unwrap();

        let account = store.find_by_id(id).await.unwrap().unwrap();
        assert!(account.is_verified);
        assert!(account.verify_otp_hash.is_none());
        assert!(account.verify_otp_expires_at.is_none());

        // 確認済みアカウントの再検証は明示的なエラー
        let result = service.verify(id, "222222").await;
        assert!(matches!(result, Err(AppError::AlreadyVerified)));
    }

    #[tokio::test]
    async fn test_verify_mismatch_checked_before_expiry() {
        let (service, store) = service_with_store();
        let id = seed_account(&store).await;
        // 期限切れかつ不一致のコードは「不一致」として報告される
        seed_otp(&store, id, "333333", -60).await;

        let result = service.verify(id, "000000").await;
        assert!(matches!(result, Err(AppError::VerifyOtpInvalid)));
    }

    #[tokio::test]
    async fn test_verify_expired_clears_state() {
        let (service, store) = service_with_store();
        let id = seed_account(&store).await;
        seed_otp(&store, id, "444444", -60).await;

        let result = service.verify(id, "444444").await;
        assert!(matches!(result, Err(AppError::VerifyOtpExpired)));

        // 期限切れ検知でOTP状態は破棄済み
        let account = store.find_by_id(id).await.unwrap().unwrap();
        assert!(account.verify_otp_hash.is_none());
        assert!(account.verify_otp_expires_at.is_none());

        // 同じコードの再提示は「未発行」として失敗する
        let result = service.verify(id, "444444").await;
        assert!(matches!(result, Err(AppError::VerifyOtpInvalid)));
    }

    #[tokio::test]
    async fn test_verify_missing_account() {
        let (service, _store) = service_with_store();

        let result = service.verify(Uuid::new_v4(), "123456").await;
        assert!(matches!(result, Err(AppError::AccountNotFound)));
    }

    #[tokio::test]
    async fn test_verify_without_issued_otp() {
        let (service, store) = service_with_store();
        let id = seed_account(&store).await;

        let result = service.verify(id, "123456").await;
        assert!(matches!(result, Err(AppError::VerifyOtpInvalid)));
    }
}
