//! # chainvote
//!
//! One-vote-per-address voting against a contract deployed on a public test
//! network, with a cookie-backed wallet session.
//!
//! ## Components
//!
//! - [`address`] — pure validation and display helpers. Everything downstream
//!   assumes lowercase addresses.
//! - [`routes`] — the session store: three auth endpoints setting/clearing one
//!   HTTP-only cookie, plus the guard for the gated pages.
//! - [`provider`] / [`wallet`] — the chain connector: a strategy table of
//!   wallet kinds over a JSON-RPC provider seam, with target-network
//!   enforcement (switch, then add-and-switch, then manual instructions).
//! - [`contract`] — the gateway to the deployed contract: fixed ABI, reads for
//!   the tally and voter records, one confirmed write for the vote itself.
//! - [`coordinator`] — client-side orchestration tying the three together into
//!   one consistent view.
//!
//! ## Trust boundaries
//!
//! The contract is the source of truth for all vote data; nothing is tallied
//! server-side. The cookie only remembers which address a browser claims, the
//! contract enforces one vote per address. Multiple wallets in one pair of
//! hands are out of scope here, that dedup belongs to the contract.
//!
//! ## Running
//!
//! ```sh
//! RUST_LOG=info cargo run
//! ```
//!
//! Configuration is environment-provided (`CHAIN_ID`, `RPC_URL`,
//! `VOTING_CONTRACT_ADDRESS`, `ADMIN_ADDRESS`, ...) with Sepolia defaults, see
//! [`config::Config`].

use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    http::{Method, header::CONTENT_TYPE},
    middleware::from_fn,
    routing::{get, post},
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

pub mod address;
pub mod candidates;
pub mod config;
pub mod contract;
pub mod coordinator;
pub mod error;
pub mod provider;
pub mod routes;
pub mod session;
pub mod state;
pub mod wallet;

use routes::{
    admin_page, landing_page, login_handler, logout_handler, require_session, session_handler,
    voting_page,
};
use state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    let gated = Router::new()
        .route("/voting", get(voting_page))
        .route("/admin", get(admin_page))
        .route_layer(from_fn(require_session));

    Router::new()
        .route("/", get(landing_page))
        .route("/api/auth/login", post(login_handler))
        .route("/api/auth/logout", post(logout_handler))
        .route("/api/auth/session", get(session_handler))
        .merge(gated)
        .with_state(state)
}

pub async fn start_server() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = AppState::new();

    info!("Starting server...");

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    let app = router(state.clone()).layer(cors);

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await.unwrap();
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    println!("Server shutting down...");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        ctrl_c().await.expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal(SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
