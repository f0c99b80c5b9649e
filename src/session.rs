//! Cookie-backed session: one HTTP-only cookie holding a normalized address.
//!
//! The server half lives in [`crate::routes`]; this module owns the cookie
//! shape and the client the coordinator uses to talk to the auth routes, the
//! same way the original frontend called its own `/api/auth/*` endpoints.

use async_trait::async_trait;
use axum_extra::extract::cookie::{Cookie, SameSite};
use reqwest::StatusCode;
use serde_json::{Value, json};

use crate::error::VoteError;

pub const SESSION_COOKIE: &str = "wallet_session";

/// What the session store knows about the browser: at most one address, plus
/// the derived admin flag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionInfo {
    pub address: Option<String>,
    pub is_admin: bool,
}

pub(crate) fn session_cookie(address: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, address))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .path("/")
        .max_age(time::Duration::days(1))
        .build()
}

/// Empty value, zero max-age. Clearing an absent cookie is a no-op, so logout
/// stays idempotent.
pub(crate) fn clear_session_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, ""))
        .http_only(true)
        .path("/")
        .max_age(time::Duration::ZERO)
        .build()
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn login(&self, address: &str) -> Result<SessionInfo, VoteError>;
    async fn logout(&self) -> Result<(), VoteError>;
    async fn fetch(&self) -> Result<SessionInfo, VoteError>;
}

/// Session store over the auth routes, with a cookie jar standing in for the
/// browser's.
pub struct HttpSessionStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSessionStore {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::builder().cookie_store(true).build().unwrap(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn session_info(body: &Value) -> SessionInfo {
        SessionInfo {
            address: body
                .get("address")
                .and_then(Value::as_str)
                .map(str::to_string),
            is_admin: body
                .get("isAdmin")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        }
    }
}

#[async_trait]
impl SessionStore for HttpSessionStore {
    async fn login(&self, address: &str) -> Result<SessionInfo, VoteError> {
        let response = self
            .client
            .post(format!("{}/api/auth/login", self.base_url))
            .json(&json!({ "address": address }))
            .send()
            .await?;

        if response.status() == StatusCode::BAD_REQUEST {
            return Err(VoteError::InvalidAddress);
        }
        if !response.status().is_success() {
            return Err(VoteError::Internal(format!(
                "Login failed with status {}",
                response.status()
            )));
        }

        let body: Value = response.json().await?;

        Ok(Self::session_info(&body))
    }

    async fn logout(&self) -> Result<(), VoteError> {
        let response = self
            .client
            .post(format!("{}/api/auth/logout", self.base_url))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(VoteError::Internal(format!(
                "Logout failed with status {}",
                response.status()
            )));
        }

        Ok(())
    }

    async fn fetch(&self) -> Result<SessionInfo, VoteError> {
        let response = self
            .client
            .get(format!("{}/api/auth/session", self.base_url))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(VoteError::Internal(format!(
                "Session fetch failed with status {}",
                response.status()
            )));
        }

        let body: Value = response.json().await?;

        Ok(Self::session_info(&body))
    }
}
