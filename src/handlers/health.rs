use axum::Json;
use serde::Serialize;

/// 死活監視レスポンス
///
/// 他のエンドポイントと違い success/message 形式は使わない。
/// 監視ツールがそのまま読める素のJSONを返す。
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub service: &'static str,
    pub status: &'static str,
    pub version: &'static str,
}

/// 死活監視ハンドラー
///
/// GET /api/health
///
/// 認証不要の唯一のGETエンドポイント。
/// セッションにもDBにも触れず、プロセスが応答できることだけを返す。
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        service: env!("CARGO_PKG_NAME"),
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_check_reports_service_identity() {
        let Json(response) = health_check().await;

        assert_eq!(response.status, "ok");
        assert_eq!(response.service, "oxauth");
        assert!(!response.version.is_empty());
    }

    #[tokio::test]
    async fn test_health_response_stays_outside_success_envelope() {
        let Json(response) = health_check().await;

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["status"], "ok");
        assert!(value.get("success").is_none());
    }
}
