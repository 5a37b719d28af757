use axum::{
    extract::{Request, State},
    http::{
        HeaderMap, HeaderValue,
        header::{AUTHORIZATION, COOKIE, SET_COOKIE},
    },
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::config::Config;
use crate::error::AppError;
use crate::state::AppState;

/// セッショントークンを載せるクッキー名
pub const SESSION_COOKIE_NAME: &str = "token";

/// 認証済みリクエストに付与されるアカウント情報
#[derive(Clone, Debug)]
pub struct AuthAccount {
    pub account_id: Uuid,
}

/// 認証必須ルート用ミドルウェア
///
/// `Authorization: Bearer` ヘッダー優先、無ければセッションクッキー。
/// トークンが無い・無効・期限切れの場合は403で打ち切り、ハンドラーは呼ばれない。
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_token(request.headers()).ok_or(AppError::TokenMissing)?;

    let claims = state.session_service.verify(&token)?;

    request.extensions_mut().insert(AuthAccount {
        account_id: claims.user_id,
    });

    Ok(next.run(request).await)
}

/// ヘッダーまたはクッキーからセッショントークンを取り出す
fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get(AUTHORIZATION)
        && let Ok(auth_str) = auth_header.to_str()
        && let Some(token) = auth_str.strip_prefix("Bearer ")
    {
        let token = token.trim();
        if !token.is_empty() {
            return Some(token.to_string());
        }
    }

    extract_session_cookie(headers)
}

/// Cookieヘッダーからセッショントークンを取り出す
pub fn extract_session_cookie(headers: &HeaderMap) -> Option<String> {
    let cookie_header = headers.get(COOKIE)?;
    let cookie_str = cookie_header.to_str().ok()?;

    // "name1=value1; name2=value2" 形式をパース
    for part in cookie_str.split(';') {
        let part = part.trim();
        if let Some(value) = part.strip_prefix(&format!("{SESSION_COOKIE_NAME}=")) {
            let value = value.trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }

    None
}

/// セッションクッキーのSet-Cookie値を構築
///
/// httpOnly固定。Secure / SameSite は環境設定で切り替わる。
pub fn build_session_cookie(token: &str, config: &Config) -> String {
    let secure_flag = if config.cookie_secure() { "; Secure" } else { "" };
    format!(
        "{SESSION_COOKIE_NAME}={token}; HttpOnly{secure_flag}; SameSite={}; Path=/; Max-Age={}",
        config.cookie_same_site(),
        config.session_ttl_secs,
    )
}

/// セッションクッキーを失効させるSet-Cookie値を構築
pub fn clear_session_cookie(config: &Config) -> String {
    let secure_flag = if config.cookie_secure() { "; Secure" } else { "" };
    format!(
        "{SESSION_COOKIE_NAME}=; HttpOnly{secure_flag}; SameSite={}; Path=/; Max-Age=0",
        config.cookie_same_site(),
    )
}

/// レスポンスにセッションクッキーを付与
pub fn attach_session_cookie(
    response: &mut Response,
    token: &str,
    config: &Config,
) -> Result<(), AppError> {
    let value = header_value(build_session_cookie(token, config))?;
    response.headers_mut().insert(SET_COOKIE, value);
    Ok(())
}

/// レスポンスにセッションクッキーの失効を付与
pub fn attach_clear_session_cookie(
    response: &mut Response,
    config: &Config,
) -> Result<(), AppError> {
    let value = header_value(clear_session_cookie(config))?;
    response.headers_mut().insert(SET_COOKIE, value);
    Ok(())
}

fn header_value(cookie: String) -> Result<HeaderValue, AppError> {
    HeaderValue::from_str(&cookie).map_err(|e| {
        tracing::error!(error = %e, "Set-Cookieヘッダーの構築に失敗");
        AppError::Internal(anyhow::anyhow!("invalid cookie header value"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use axum::body::Body;

    #[test]
    fn test_extract_token_prefers_bearer_header() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer header-token"));
        headers.insert(COOKIE, HeaderValue::from_static("token=cookie-token"));

        assert_eq!(extract_token(&headers), Some("header-token".to_string()));
    }

    #[test]
    fn test_extract_token_falls_back_to_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("token=cookie-token"));

        assert_eq!(extract_token(&headers), Some("cookie-token".to_string()));
    }

    #[test]
    fn test_extract_token_requires_bearer_prefix() {
        // プレフィックスなしのAuthorizationヘッダーは無視してクッキーを使う
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("raw-token"));
        headers.insert(COOKIE, HeaderValue::from_static("token=cookie-token"));

        assert_eq!(extract_token(&headers), Some("cookie-token".to_string()));
    }

    #[test]
    fn test_extract_token_missing() {
        let headers = HeaderMap::new();
        assert_eq!(extract_token(&headers), None);
    }

    #[test]
    fn test_extract_session_cookie_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("other=value; token=abc123; another=test"),
        );

        assert_eq!(extract_session_cookie(&headers), Some("abc123".to_string()));
    }

    #[test]
    fn test_extract_session_cookie_empty_value() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("token="));

        assert_eq!(extract_session_cookie(&headers), None);
    }

    #[test]
    fn test_build_session_cookie_development() {
        let config = test_config();
        let cookie = build_session_cookie("abc123", &config);

        assert!(cookie.starts_with("token=abc123"));
        assert!(cookie.contains("HttpOnly"));
        assert!(!cookie.contains("Secure"));
        assert!(cookie.contains("SameSite=None"));
        assert!(cookie.contains("Max-Age=86400"));
    }

    #[test]
    fn test_build_session_cookie_production() {
        let mut config = test_config();
        config.environment = "production".to_string();
        let cookie = build_session_cookie("abc123", &config);

        assert!(cookie.contains("Secure"));
        assert!(cookie.contains("SameSite=Strict"));
    }

    #[test]
    fn test_clear_session_cookie_expires_immediately() {
        let config = test_config();
        let cookie = clear_session_cookie(&config);

        assert!(cookie.starts_with("token="));
        assert!(cookie.contains("Max-Age=0"));
        assert!(cookie.contains("HttpOnly"));
    }

    #[test]
    fn test_attach_session_cookie_sets_header() {
        let config = test_config();
        let mut response = Response::new(Body::empty());

        attach_session_cookie(&mut response, "abc", &config).unwrap();

        let cookie = response
            .headers()
            .get(SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .unwrap();
        assert!(cookie.starts_with("token=abc;"));
    }

    #[test]
    fn test_attach_clear_session_cookie_sets_header() {
        let config = test_config();
        let mut response = Response::new(Body::empty());

        attach_clear_session_cookie(&mut response, &config).unwrap();

        let cookie = response
            .headers()
            .get(SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .unwrap();
        assert!(cookie.contains("Max-Age=0"));
    }
}
