use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Everything that can go wrong between the wallet, the session routes and the
/// voting contract. Messages are user-facing; the coordinator surfaces them
/// verbatim.
#[derive(Error, Debug)]
pub enum VoteError {
    #[error("Address must be a 0x-prefixed 40 character hex string")]
    InvalidAddress,

    #[error("No wallet provider detected for `{0}`. Make sure the wallet is installed")]
    ProviderUnavailable(String),

    #[error("Request was rejected by the user")]
    UserRejected,

    #[error("The wallet returned no accounts")]
    NoAccounts,

    #[error("Wrong network: expected chain {expected}, wallet is on {actual}")]
    WrongNetwork { expected: u64, actual: String },

    #[error("Failed to set up the target network. Add it manually:\n{instructions}")]
    NetworkSetupFailed { instructions: String },

    #[error("No voting contract deployed at {0}. Check the address and network")]
    ContractNotFound(String),

    #[error("Unknown candidate `{0}`")]
    InvalidCandidate(String),

    #[error("Wallet is not connected")]
    NotConnected,

    #[error("This address has already voted")]
    AlreadyVoted,

    #[error("Could not fetch the session after {0} attempts")]
    SessionFetchFailed(u32),

    #[error("Another operation is still in flight")]
    OperationInFlight,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl VoteError {
    /// Network-classified failures get persistent repair guidance in the UI
    /// instead of a one-shot connection error.
    pub fn is_network_error(&self) -> bool {
        matches!(
            self,
            VoteError::WrongNetwork { .. } | VoteError::NetworkSetupFailed { .. }
        )
    }
}

impl From<reqwest::Error> for VoteError {
    fn from(err: reqwest::Error) -> Self {
        VoteError::Internal(err.to_string())
    }
}

/// Route-facing errors. The auth routes can only fail on input shape; the
/// contract and wallet failures never travel through them.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Address must be a 0x-prefixed 40 character hex string")]
    InvalidAddress,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::InvalidAddress => StatusCode::BAD_REQUEST,
        };

        (
            status,
            Json(json!({ "success": false, "error": self.to_string() })),
        )
            .into_response()
    }
}
