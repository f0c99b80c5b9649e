//! Session/voting coordinator: one consistent client view over the session
//! store, the chain connector and the contract gateway.
//!
//! The coordinator is single-owner state. Every public method resolves to a
//! value or a classified [`VoteError`]; nothing escapes to the presentation
//! layer unhandled. The session fetch during [`Coordinator::initialize`] is
//! the only operation that retries automatically. Vote submission never does,
//! a paid state-changing transaction is not safe to resubmit blindly.

use std::{sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::{
    candidates::{Candidate, CandidateKey, VoteTally, candidate},
    contract::ContractGateway,
    error::VoteError,
    provider::{Provider, ProviderRegistry},
    session::SessionStore,
    wallet::{ChainConnector, ChainParams},
};

const SESSION_FETCH_RETRIES: u32 = 3;

/// Explicit user confirmation step before a vote is submitted.
pub trait Confirmer: Send + Sync {
    fn confirm(&self, candidate: &Candidate) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    Cast(VoteTally),
    Declined,
}

/// Everything the presentation layer renders.
#[derive(Debug, Clone, Default)]
pub struct VotingView {
    pub account: String,
    pub connected: bool,
    pub admin: bool,
    pub has_voted: bool,
    pub selected_candidate: Option<CandidateKey>,
    pub tally: VoteTally,
    /// Persistent network-repair guidance, distinct from one-shot failures.
    pub network_error: Option<String>,
}

pub struct Coordinator {
    session: Arc<dyn SessionStore>,
    registry: ProviderRegistry,
    chain: ChainParams,
    contract_address: String,
    /// Read path; always available, never prompts.
    read_provider: Arc<dyn Provider>,
    /// Owned from connect to disconnect, never a global singleton.
    wallet_provider: Option<Arc<dyn Provider>>,
    view: VotingView,
    connecting: bool,
    voting: bool,
}

impl Coordinator {
    pub fn new(
        session: Arc<dyn SessionStore>,
        registry: ProviderRegistry,
        chain: ChainParams,
        contract_address: &str,
        read_provider: Arc<dyn Provider>,
    ) -> Self {
        Self {
            session,
            registry,
            chain,
            contract_address: contract_address.to_lowercase(),
            read_provider,
            wallet_provider: None,
            view: VotingView::default(),
            connecting: false,
            voting: false,
        }
    }

    pub fn view(&self) -> &VotingView {
        &self.view
    }

    /// Restores the session on load: cookie first, then the contract's view
    /// of whether that address already voted, then the public tally.
    ///
    /// The session fetch retries up to three times with linear backoff before
    /// giving up and resetting to the disconnected state.
    pub async fn initialize(&mut self) -> Result<(), VoteError> {
        let mut restored = None;

        for attempt in 0..=SESSION_FETCH_RETRIES {
            match self.session.fetch().await {
                Ok(info) => {
                    restored = Some(info);
                    break;
                }
                Err(err) => {
                    warn!("Session fetch attempt {} failed: {err}", attempt + 1);

                    if attempt < SESSION_FETCH_RETRIES {
                        sleep(Duration::from_secs(u64::from(attempt) + 1)).await;
                    }
                }
            }
        }

        let Some(info) = restored else {
            self.reset_local_state();
            return Err(VoteError::SessionFetchFailed(SESSION_FETCH_RETRIES + 1));
        };

        match info.address {
            Some(address) => {
                info!("Restored session for {address}");

                self.view.account = address;
                self.view.connected = true;
                self.view.admin = info.is_admin;
                self.refresh_vote_status().await;
            }
            None => self.reset_local_state(),
        }

        // The tally is public; show it whether or not a session exists.
        match self.read_gateway().load_tally().await {
            Ok(tally) => self.view.tally = tally,
            Err(err) => warn!("Could not load the tally: {err}"),
        }

        Ok(())
    }

    /// Connects a wallet, persists the session cookie and re-checks vote
    /// status. Network-classified failures land in the view's network-error
    /// slot so the UI can keep showing repair guidance.
    pub async fn connect(&mut self, wallet_id: &str) -> Result<String, VoteError> {
        if self.connecting {
            return Err(VoteError::OperationInFlight);
        }

        self.connecting = true;
        let result = self.connect_inner(wallet_id).await;
        self.connecting = false;

        if let Err(err) = &result {
            error!("Connect failed: {err}");

            if err.is_network_error() {
                self.view.network_error = Some(err.to_string());
            }
        }

        result
    }

    async fn connect_inner(&mut self, wallet_id: &str) -> Result<String, VoteError> {
        self.view.network_error = None;

        let connector = ChainConnector::from_registry(&self.registry, wallet_id, self.chain.clone())?;
        let address = connector.connect().await?;
        let info = self.session.login(&address).await?;

        self.wallet_provider = Some(connector.provider());
        self.view.account = address.clone();
        self.view.connected = true;
        self.view.admin = info.is_admin;
        self.refresh_vote_status().await;

        Ok(address)
    }

    /// Client-state-first: local state clears immediately, the cookie and the
    /// provider are torn down best-effort afterwards and failures never
    /// resurrect the cleared state.
    pub async fn disconnect(&mut self) {
        let provider = self.wallet_provider.take();
        self.reset_local_state();

        if let Err(err) = self.session.logout().await {
            error!("Logout failed: {err}");
        }

        if let Some(provider) = provider {
            provider.disconnect().await;
        }
    }

    /// Casts a vote for `key` after an explicit confirmation.
    ///
    /// The not-connected and already-voted guards are entirely client-side;
    /// the gateway is never invoked for them. Failures surface verbatim and
    /// are never retried automatically.
    pub async fn vote(
        &mut self,
        key: &str,
        confirmer: &dyn Confirmer,
    ) -> Result<VoteOutcome, VoteError> {
        if self.voting {
            return Err(VoteError::OperationInFlight);
        }
        if !self.view.connected {
            return Err(VoteError::NotConnected);
        }
        if self.view.has_voted {
            return Err(VoteError::AlreadyVoted);
        }

        let key = CandidateKey::parse(key)?;

        if !confirmer.confirm(candidate(key)) {
            info!("Vote for {} not confirmed, nothing submitted", key.as_str());
            return Ok(VoteOutcome::Declined);
        }

        self.voting = true;
        let result = self.wallet_gateway().cast_vote(key, &self.view.account).await;
        self.voting = false;

        match result {
            Ok(tally) => {
                self.view.tally = tally;
                self.view.has_voted = true;
                self.view.selected_candidate = Some(key);

                Ok(VoteOutcome::Cast(tally))
            }
            Err(err) => {
                error!("Vote failed: {err}");

                Err(err)
            }
        }
    }

    /// Re-checks whether the current account voted and which candidate it
    /// picked. Read failures are logged and leave the safe default.
    pub async fn refresh_vote_status(&mut self) {
        if self.view.account.is_empty() {
            return;
        }

        let gateway = self.read_gateway();

        match gateway.has_voted(&self.view.account).await {
            Ok(voted) => self.view.has_voted = voted,
            Err(err) => {
                error!("Vote status check failed: {err}");
                self.view.has_voted = false;
            }
        }

        if !self.view.has_voted {
            self.view.selected_candidate = None;
            return;
        }

        match gateway.get_voted_candidate(&self.view.account).await {
            Ok(selected) => self.view.selected_candidate = selected,
            Err(err) => {
                error!("Voted-candidate lookup failed: {err}");
                self.view.selected_candidate = None;
            }
        }
    }

    fn reset_local_state(&mut self) {
        self.view.account.clear();
        self.view.connected = false;
        self.view.admin = false;
        self.view.has_voted = false;
        self.view.selected_candidate = None;
        self.view.network_error = None;
    }

    fn read_gateway(&self) -> ContractGateway {
        ContractGateway::new(
            self.read_provider.clone(),
            self.chain.chain_id,
            &self.contract_address,
        )
    }

    /// Writes go through the connected wallet when one is held; a restored
    /// session without a wallet falls back to the read provider, whose
    /// inability to sign surfaces as the submission error.
    fn wallet_gateway(&self) -> ContractGateway {
        let provider = self
            .wallet_provider
            .clone()
            .unwrap_or_else(|| self.read_provider.clone());

        ContractGateway::new(provider, self.chain.chain_id, &self.contract_address)
    }
}
