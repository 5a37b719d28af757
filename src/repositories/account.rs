use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::Account;

/// アカウントストアの抽象
///
/// 本番は `PgAccountStore`、テスト・開発は `MemoryAccountStore` を使う。
/// OTP状態の更新は全てこのトレイト経由で行い、平文のOTP素材は永続化しない。
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, AppError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, AppError>;

    /// ユーザー名またはメールアドレスのいずれかが一致するアカウントを検索
    async fn find_by_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> Result<Option<Account>, AppError>;

    /// 新しいアカウントを作成
    ///
    /// UNIQUE制約違反は `AppError::AccountAlreadyExists` に変換される
    /// （事前チェックとINSERTの間のレースに対する保険）。
    async fn create(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<Account, AppError>;

    /// メール確認用OTPを設定（既存のOTPは上書き）
    async fn set_verify_otp(
        &self,
        id: Uuid,
        otp_hash: &str,
        expires_at: OffsetDateTime,
    ) -> Result<(), AppError>;

    /// メール確認用OTP状態をクリア
    async fn clear_verify_otp(&self, id: Uuid) -> Result<(), AppError>;

    /// アカウントを確認済みにし、確認用OTP状態を同一更新内でクリア
    async fn mark_verified(&self, id: Uuid) -> Result<(), AppError>;

    /// リセット用OTPを設定（試行回数は0に戻る）
    async fn set_reset_otp(
        &self,
        id: Uuid,
        otp_hash: &str,
        expires_at: OffsetDateTime,
    ) -> Result<(), AppError>;

    /// リセット用OTP状態をクリア
    async fn clear_reset_otp(&self, id: Uuid) -> Result<(), AppError>;

    /// リセットOTPの失敗回数を条件付きでインクリメント
    ///
    /// 同一サイクル（expires_at が一致）かつ上限未満の場合のみ加算する。
    /// 並行リクエストが上限を超えて加算することはない。
    /// 加算後の値を返す。条件を満たさなければ `None`。
    async fn increment_reset_attempts(
        &self,
        id: Uuid,
        cycle_expires_at: OffsetDateTime,
        limit: i32,
    ) -> Result<Option<i32>, AppError>;

    /// パスワードを更新し、リセットOTP状態を同一更新内でクリア
    async fn update_password_and_clear_reset(
        &self,
        id: Uuid,
        password_hash: &str,
    ) -> Result<(), AppError>;

    /// アカウントを削除。行が存在した場合 true
    async fn delete(&self, id: Uuid) -> Result<bool, AppError>;
}

#[derive(Clone)]
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, AppError> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, username, email, password_hash, is_verified,
                   verify_otp_hash, verify_otp_expires_at,
                   reset_otp_hash, reset_otp_expires_at, reset_otp_attempts,
                   created_at, updated_at
            FROM accounts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, AppError> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, username, email, password_hash, is_verified,
                   verify_otp_hash, verify_otp_expires_at,
                   reset_otp_hash, reset_otp_expires_at, reset_otp_attempts,
                   created_at, updated_at
            FROM accounts
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    async fn find_by_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> Result<Option<Account>, AppError> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, username, email, password_hash, is_verified,
                   verify_otp_hash, verify_otp_expires_at,
                   reset_otp_hash, reset_otp_expires_at, reset_otp_attempts,
                   created_at, updated_at
            FROM accounts
            WHERE username = $1 OR email = $2
            "#,
        )
        .bind(username)
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    async fn create(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<Account, AppError> {
        sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (username, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, username, email, password_hash, is_verified,
                      verify_otp_hash, verify_otp_expires_at,
                      reset_otp_hash, reset_otp_expires_at, reset_otp_attempts,
                      created_at, updated_at
            "#,
        )
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            // UNIQUE制約違反チェック
            if let sqlx::Error::Database(db_err) = &e
                && matches!(
                    db_err.constraint(),
                    Some("accounts_username_key") | Some("accounts_email_key")
                )
            {
                return AppError::AccountAlreadyExists;
            }
            AppError::Database(e)
        })
    }

    async fn set_verify_otp(
        &self,
        id: Uuid,
        otp_hash: &str,
        expires_at: OffsetDateTime,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE accounts
            SET verify_otp_hash = $2, verify_otp_expires_at = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(otp_hash)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn clear_verify_otp(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE accounts
            SET verify_otp_hash = NULL, verify_otp_expires_at = NULL, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_verified(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE accounts
            SET is_verified = TRUE,
                verify_otp_hash = NULL,
                verify_otp_expires_at = NULL,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_reset_otp(
        &self,
        id: Uuid,
        otp_hash: &str,
        expires_at: OffsetDateTime,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE accounts
            SET reset_otp_hash = $2,
                reset_otp_expires_at = $3,
                reset_otp_attempts = 0,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(otp_hash)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn clear_reset_otp(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE accounts
            SET reset_otp_hash = NULL,
                reset_otp_expires_at = NULL,
                reset_otp_attempts = 0,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn increment_reset_attempts(
        &self,
        id: Uuid,
        cycle_expires_at: OffsetDateTime,
        limit: i32,
    ) -> Result<Option<i32>, AppError> {
        // 単一の条件付きUPDATEで read-check-increment を行う。
        // expires_at の一致条件により、別サイクルのカウンタを誤って進めない。
        let row: Option<(i32,)> = sqlx::query_as(
            r#"
            UPDATE accounts
            SET reset_otp_attempts = reset_otp_attempts + 1, updated_at = NOW()
            WHERE id = $1
              AND reset_otp_expires_at = $2
              AND reset_otp_attempts < $3
            RETURNING reset_otp_attempts
            "#,
        )
        .bind(id)
        .bind(cycle_expires_at)
        .bind(limit)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(attempts,)| attempts))
    }

    async fn update_password_and_clear_reset(
        &self,
        id: Uuid,
        password_hash: &str,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE accounts
            SET password_hash = $2,
                reset_otp_hash = NULL,
                reset_otp_expires_at = NULL,
                reset_otp_attempts = 0,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
