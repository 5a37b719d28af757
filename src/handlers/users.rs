use axum::{
    Extension, Json,
    extract::{Path, State},
};
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::AuthAccount;
use crate::models::AccountProjection;
use crate::repositories::AccountStore;
use crate::state::AppState;

/// ログイン中アカウント情報レスポンス
#[derive(Debug, Serialize)]
pub struct CurrentUserResponse {
    pub success: bool,
    #[serde(rename = "userData")]
    pub user_data: AccountProjection,
}

/// アカウント削除レスポンス
#[derive(Debug, Serialize)]
pub struct DeleteUserResponse {
    pub success: bool,
    pub message: String,
}

/// ログイン中アカウント情報ハンドラー
///
/// GET /api/users （要認証）
///
/// セッションに紐づくアカウントの公開プロフィールを返す。
/// パスワードハッシュやOTP状態は含めない。
pub async fn current_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthAccount>,
) -> Result<Json<CurrentUserResponse>, AppError> {
    let account = state
        .account_store
        .find_by_id(auth.account_id)
        .await?
        .ok_or(AppError::AccountNotFound)?;

    Ok(Json(CurrentUserResponse {
        success: true,
        user_data: AccountProjection::from(&account),
    }))
}

/// アカウント削除ハンドラー
///
/// DELETE /api/users/{id} （要認証）
///
/// 冪等な操作。存在しないIDでも同じレスポンスを返す。
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteUserResponse>, AppError> {
    let existed = state.account_store.delete(id).await?;

    if existed {
        tracing::info!(account_id = %id, "アカウントを削除");
    }

    Ok(Json(DeleteUserResponse {
        success: true,
        message: format!("ユーザー {id} を削除しました"),
    }))
}
