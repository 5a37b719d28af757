use std::sync::Arc;

use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};

use crate::error::AppError;
use crate::models::Account;
use crate::repositories::AccountStore;

/// 検索・重複チェック前のメールアドレス正規化
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// パスワードをargon2idでハッシュ化
///
/// OTPも同じプリミティブでハッシュする。保存された素材から
/// 平文コードを復元できず、照合は定数時間比較になる。
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| {
            tracing::error!(error = ?e, "パスワードハッシュ生成エラー");
            AppError::Internal(anyhow::anyhow!("password hash error"))
        })?;
    Ok(hash.to_string())
}

/// argon2ハッシュとの照合
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|e| {
        tracing::error!(error = ?e, "パスワードハッシュのパースエラー");
        AppError::Internal(anyhow::anyhow!("password hash parse error"))
    })?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// 認証サービス
pub struct AuthService<S> {
    store: Arc<S>,
}

impl<S: AccountStore> AuthService<S> {
    /// 新しい AuthService を作成
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// 新規アカウントを登録
    ///
    /// ユーザー名またはメールアドレスが既存なら `AccountAlreadyExists`。
    /// INSERT側のUNIQUE制約が事前チェックとのレースを塞ぐ。
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<Account, AppError> {
        let email = normalize_email(email);

        if self
            .store
            .find_by_username_or_email(username, &email)
            .await?
            .is_some()
        {
            tracing::warn!(username = %username, "登録失敗: 既存アカウント");
            return Err(AppError::AccountAlreadyExists);
        }

        let password_hash = hash_password(password)?;
        let account = self.store.create(username, &email, &password_hash).await?;

        tracing::info!(account_id = %account.id, "アカウント登録成功");

        Ok(account)
    }

    /// ユーザー認証を実行
    ///
    /// タイミング攻撃対策: ユーザーが存在しない場合もダミーのパスワード検証を実行
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Account, AppError> {
        let email = normalize_email(email);
        let account = self.store.find_by_email(&email).await?;

        match account {
            Some(account) => {
                if verify_password(password, &account.password_hash)? {
                    tracing::info!(account_id = %account.id, "認証成功");
                    Ok(account)
                } else {
                    tracing::warn!(email = %email, "認証失敗: パスワード不一致");
                    Err(AppError::Authentication("invalid_credentials".to_string()))
                }
            }
            None => {
                // タイミング攻撃対策: ユーザーが存在しない場合もダミーのパスワード検証を実行
                // これにより、ユーザーの存在有無を応答時間から推測できなくなる
                let dummy_hash = "$argon2id$v=19$m=19456,t=2,p=1$c29tZXNhbHQ$RWh6";
                let _ = verify_password(password, dummy_hash);
                tracing::warn!(email = %email, "認証失敗: ユーザー不在");
                Err(AppError::Authentication("invalid_credentials".to_string()))
            }
        }
    }
}
