use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::error::AppError;
use crate::middleware::attach_clear_session_cookie;
use crate::state::AppState;

/// ログアウトレスポンス
#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub success: bool,
    pub message: String,
}

/// ログアウトハンドラー
///
/// POST /auth/api/logout
///
/// セッションクッキーを失効させる。トークンの有無は問わないため、
/// 既にログアウト済みでも同じレスポンスを返す。
pub async fn logout(State(state): State<AppState>) -> Result<Response, AppError> {
    let mut response = (
        StatusCode::OK,
        Json(LogoutResponse {
            success: true,
            message: "ログアウトしました".to_string(),
        }),
    )
        .into_response();

    attach_clear_session_cookie(&mut response, &state.config)?;

    tracing::info!("ログアウト完了");

    Ok(response)
}
