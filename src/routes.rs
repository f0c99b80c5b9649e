//! Auth routes and the session guard for the gated pages.
//!
//! The session cookie is the single source of truth: each request resolves it
//! independently, writes are last-write-wins per browser. A malformed cookie
//! value is treated as absent and proactively cleared wherever it is seen.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Request, State},
    middleware::Next,
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::{
    address::{format_short, is_valid_address, normalize},
    error::AppError,
    session::{SESSION_COOKIE, clear_session_cookie, session_cookie},
    state::AppState,
};

#[derive(Deserialize)]
pub struct LoginRequest {
    address: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    success: bool,
    address: String,
    #[serde(rename = "isAdmin")]
    is_admin: bool,
    timestamp: i64,
}

#[derive(Serialize)]
pub struct SessionResponse {
    address: Option<String>,
    #[serde(rename = "isAdmin")]
    is_admin: bool,
    timestamp: i64,
}

pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let normalized = normalize(&payload.address).map_err(|_| AppError::InvalidAddress)?;
    let is_admin = normalized == state.config.admin_address;

    info!("Session opened for {}", format_short(&normalized));

    let jar = jar.add(session_cookie(
        normalized.clone(),
        state.config.secure_cookies,
    ));

    Ok((
        jar,
        Json(LoginResponse {
            success: true,
            address: normalized,
            is_admin,
            timestamp: Utc::now().timestamp(),
        }),
    ))
}

pub async fn logout_handler(jar: CookieJar) -> impl IntoResponse {
    (
        jar.add(clear_session_cookie()),
        Json(json!({ "success": true })),
    )
}

pub async fn session_handler(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> impl IntoResponse {
    let timestamp = Utc::now().timestamp();

    let empty = SessionResponse {
        address: None,
        is_admin: false,
        timestamp,
    };

    match jar.get(SESSION_COOKIE) {
        None => (jar, Json(empty)),
        Some(cookie) => match normalize(cookie.value()) {
            Ok(address) => {
                let is_admin = address == state.config.admin_address;

                (
                    jar,
                    Json(SessionResponse {
                        address: Some(address),
                        is_admin,
                        timestamp,
                    }),
                )
            }
            Err(_) => {
                warn!("Clearing malformed session cookie");

                (jar.add(clear_session_cookie()), Json(empty))
            }
        },
    }
}

/// Gates the voting and admin pages on a syntactically valid session cookie.
/// Absent sends the browser back to the landing page; malformed also clears
/// the cookie on the way out.
pub async fn require_session(jar: CookieJar, request: Request, next: Next) -> Response {
    match jar.get(SESSION_COOKIE) {
        None => Redirect::to("/").into_response(),
        Some(cookie) if !is_valid_address(cookie.value()) => {
            warn!("Redirecting request with malformed session cookie");

            (jar.add(clear_session_cookie()), Redirect::to("/")).into_response()
        }
        Some(_) => next.run(request).await,
    }
}

// Presentation is out of scope; the pages exist as guard targets.

pub async fn landing_page() -> Html<&'static str> {
    Html("<h1>chainvote</h1><p>Connect a wallet to vote.</p>")
}

pub async fn voting_page() -> Html<&'static str> {
    Html("<h1>Voting</h1>")
}

pub async fn admin_page() -> Html<&'static str> {
    Html("<h1>Admin</h1>")
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{Body, to_bytes},
        http::{Request as HttpRequest, StatusCode, header},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::{config::Config, router, state::AppState};

    use super::*;

    const ADMIN: &str = "0x1d1afc2d015963017bed1de13e4ed6c3d3ed1618";
    const VOTER: &str = "0xabcdefabcdefabcdefabcdefabcdefabcdefabcd";

    fn test_state() -> Arc<AppState> {
        Arc::new(AppState {
            config: Config {
                port: 0,
                chain_id: 11155111,
                chain_id_hex: "0xaa36a7".to_string(),
                chain_name: "Sepolia".to_string(),
                currency_name: "Sepolia Ether".to_string(),
                currency_symbol: "ETH".to_string(),
                rpc_url: "http://localhost:8545".to_string(),
                explorer_url: "https://sepolia.etherscan.io".to_string(),
                contract_address: "0xee35da4e3a9a734b0a5227c99e361c1fdf9b3e5b".to_string(),
                admin_address: ADMIN.to_string(),
                secure_cookies: false,
            },
        })
    }

    fn login_request(address: &str) -> HttpRequest<Body> {
        HttpRequest::builder()
            .method("POST")
            .uri("/api/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(format!("{{\"address\":\"{address}\"}}")))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();

        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn login_rejects_malformed_address() {
        let response = router(test_state())
            .oneshot(login_request("0xnope"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn login_normalizes_and_flags_admin() {
        let response = router(test_state())
            .oneshot(login_request(&ADMIN.to_uppercase().replace("0X", "0x")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(set_cookie.contains(&format!("wallet_session={ADMIN}")));
        assert!(set_cookie.contains("HttpOnly"));
        assert!(set_cookie.contains("SameSite=Strict"));

        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["address"], ADMIN);
        assert_eq!(body["isAdmin"], true);
        assert!(body["timestamp"].is_i64());
    }

    #[tokio::test]
    async fn login_non_admin_address() {
        let response = router(test_state())
            .oneshot(login_request(VOTER))
            .await
            .unwrap();

        let body = body_json(response).await;
        assert_eq!(body["isAdmin"], false);
        assert_eq!(body["address"], VOTER);
    }

    #[tokio::test]
    async fn session_without_cookie_is_anonymous() {
        let request = HttpRequest::builder()
            .uri("/api/auth/session")
            .body(Body::empty())
            .unwrap();
        let response = router(test_state()).oneshot(request).await.unwrap();

        let body = body_json(response).await;
        assert_eq!(body["address"], Value::Null);
        assert_eq!(body["isAdmin"], false);
    }

    #[tokio::test]
    async fn session_reads_back_login() {
        let request = HttpRequest::builder()
            .uri("/api/auth/session")
            .header(header::COOKIE, format!("wallet_session={ADMIN}"))
            .body(Body::empty())
            .unwrap();
        let response = router(test_state()).oneshot(request).await.unwrap();

        let body = body_json(response).await;
        assert_eq!(body["address"], ADMIN);
        assert_eq!(body["isAdmin"], true);
    }

    #[tokio::test]
    async fn malformed_session_cookie_is_cleared() {
        let request = HttpRequest::builder()
            .uri("/api/auth/session")
            .header(header::COOKIE, "wallet_session=not-an-address")
            .body(Body::empty())
            .unwrap();
        let response = router(test_state()).oneshot(request).await.unwrap();

        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(set_cookie.contains("wallet_session="));
        assert!(set_cookie.contains("Max-Age=0"));

        let body = body_json(response).await;
        assert_eq!(body["address"], Value::Null);
    }

    #[tokio::test]
    async fn logout_clears_cookie_and_is_idempotent() {
        let request = HttpRequest::builder()
            .method("POST")
            .uri("/api/auth/logout")
            .body(Body::empty())
            .unwrap();
        let response = router(test_state()).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(set_cookie.contains("Max-Age=0"));

        let body = body_json(response).await;
        assert_eq!(body["success"], true);
    }

    #[tokio::test]
    async fn gated_page_redirects_without_session() {
        for path in ["/voting", "/admin"] {
            let request = HttpRequest::builder().uri(path).body(Body::empty()).unwrap();
            let response = router(test_state()).oneshot(request).await.unwrap();

            assert_eq!(response.status(), StatusCode::SEE_OTHER);
            assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/");
        }
    }

    #[tokio::test]
    async fn gated_page_clears_malformed_cookie() {
        let request = HttpRequest::builder()
            .uri("/voting")
            .header(header::COOKIE, "wallet_session=garbage")
            .body(Body::empty())
            .unwrap();
        let response = router(test_state()).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(set_cookie.contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn gated_page_loads_with_valid_session() {
        let request = HttpRequest::builder()
            .uri("/voting")
            .header(header::COOKIE, format!("wallet_session={VOTER}"))
            .body(Body::empty())
            .unwrap();
        let response = router(test_state()).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
