use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::Account;
use crate::repositories::AccountStore;

/// インメモリのアカウントストア（テスト・開発用）
///
/// 再起動でデータが消えるため本番では使わない。
/// `PgAccountStore` と同じ契約を満たす（UNIQUE相当のチェック、
/// 条件付きインクリメント、存在しない行への更新は no-op）。
pub struct MemoryAccountStore {
    accounts: RwLock<HashMap<Uuid, Account>>,
}

impl Default for MemoryAccountStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
        }
    }

    /// 保持しているアカウント数
    pub fn count(&self) -> usize {
        self.accounts.read().unwrap().len()
    }

    fn update<F>(&self, id: Uuid, f: F)
    where
        F: FnOnce(&mut Account),
    {
        let mut accounts = self.accounts.write().unwrap();
        if let Some(account) = accounts.get_mut(&id) {
            f(account);
            account.updated_at = OffsetDateTime::now_utc();
        }
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, AppError> {
        Ok(self.accounts.read().unwrap().get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, AppError> {
        Ok(self
            .accounts
            .read()
            .unwrap()
            .values()
            .find(|a| a.email == email)
            .cloned())
    }

    async fn find_by_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> Result<Option<Account>, AppError> {
        Ok(self
            .accounts
            .read()
            .unwrap()
            .values()
            .find(|a| a.username == username || a.email == email)
            .cloned())
    }

    async fn create(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<Account, AppError> {
        let mut accounts = self.accounts.write().unwrap();

        // UNIQUE制約相当のチェック
        if accounts
            .values()
            .any(|a| a.username == username || a.email == email)
        {
            return Err(AppError::AccountAlreadyExists);
        }

        let now = OffsetDateTime::now_utc();
        let account = Account {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            is_verified: false,
            verify_otp_hash: None,
            verify_otp_expires_at: None,
            reset_otp_hash: None,
            reset_otp_expires_at: None,
            reset_otp_attempts: 0,
            created_at: now,
            updated_at: now,
        };
        accounts.insert(account.id, account.clone());

        Ok(account)
    }

    async fn set_verify_otp(
        &self,
        id: Uuid,
        otp_hash: &str,
        expires_at: OffsetDateTime,
    ) -> Result<(), AppError> {
        self.update(id, |account| {
            account.verify_otp_hash = Some(otp_hash.to_string());
            account.verify_otp_expires_at = Some(expires_at);
        });
        Ok(())
    }

    async fn clear_verify_otp(&self, id: Uuid) -> Result<(), AppError> {
        self.update(id, |account| {
            account.verify_otp_hash = None;
            account.verify_otp_expires_at = None;
        });
        Ok(())
    }

    async fn mark_verified(&self, id: Uuid) -> Result<(), AppError> {
        self.update(id, |account| {
            account.is_verified = true;
            account.verify_otp_hash = None;
            account.verify_otp_expires_at = None;
        });
        Ok(())
    }

    async fn set_reset_otp(
        &self,
        id: Uuid,
        otp_hash: &str,
        expires_at: OffsetDateTime,
    ) -> Result<(), AppError> {
        self.update(id, |account| {
            account.reset_otp_hash = Some(otp_hash.to_string());
            account.reset_otp_expires_at = Some(expires_at);
            account.reset_otp_attempts = 0;
        });
        Ok(())
    }

    async fn clear_reset_otp(&self, id: Uuid) -> Result<(), AppError> {
        self.update(id, |account| {
            account.reset_otp_hash = None;
            account.reset_otp_expires_at = None;
            account.reset_otp_attempts = 0;
        });
        Ok(())
    }

    async fn increment_reset_attempts(
        &self,
        id: Uuid,
        cycle_expires_at: OffsetDateTime,
        limit: i32,
    ) -> Result<Option<i32>, AppError> {
        let mut accounts = self.accounts.write().unwrap();
        let Some(account) = accounts.get_mut(&id) else {
            return Ok(None);
        };

        // 同一サイクルかつ上限未満の場合のみ加算（PgAccountStore と同じ条件）
        if account.reset_otp_expires_at != Some(cycle_expires_at)
            || account.reset_otp_attempts >= limit
        {
            return Ok(None);
        }

        account.reset_otp_attempts += 1;
        account.updated_at = OffsetDateTime::now_utc();
        Ok(Some(account.reset_otp_attempts))
    }

    async fn update_password_and_clear_reset(
        &self,
        id: Uuid,
        password_hash: &str,
    ) -> Result<(), AppError> {
        self.update(id, |account| {
            account.password_hash = password_hash.to_string();
            account.reset_otp_hash = None;
            account.reset_otp_expires_at = None;
            account.reset_otp_attempts = 0;
        });
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        Ok(self.accounts.write().unwrap().remove(&id).is_some())
    }
}
