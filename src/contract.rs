//! Gateway to the deployed voting contract.
//!
//! The contract interface is fixed: `vote(uint8)`, `getVotes() → uint256[3]`,
//! `totalVotes() → uint256`, `hasVoted(address) → bool` and
//! `getVoteInfo(address) → (bool, uint8, uint256)`. All of those are static
//! ABI types, so calldata is a Keccak-256 selector followed by 32-byte words
//! and responses decode by word slicing.
//!
//! Every operation first verifies the provider is on the target chain and that
//! code is actually deployed at the configured address. Both checks guard
//! against misconfiguration, not against a hostile contract.

use std::{sync::Arc, time::Duration};

use serde_json::{Value, json};
use sha3::{Digest, Keccak256};
use tokio::time::sleep;
use tracing::info;

use crate::{
    candidates::{CandidateKey, VoteTally},
    error::VoteError,
    provider::{Provider, RpcError},
    wallet::parse_chain_id,
};

const SIG_VOTE: &str = "vote(uint8)";
const SIG_GET_VOTES: &str = "getVotes()";
const SIG_TOTAL_VOTES: &str = "totalVotes()";
const SIG_HAS_VOTED: &str = "hasVoted(address)";
const SIG_GET_VOTE_INFO: &str = "getVoteInfo(address)";

const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Per-address voting fact as stored by the contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoterRecord {
    pub has_voted: bool,
    pub candidate_index: u8,
    pub timestamp: u64,
}

pub struct ContractGateway {
    provider: Arc<dyn Provider>,
    chain_id: u64,
    contract_address: String,
}

impl ContractGateway {
    pub fn new(provider: Arc<dyn Provider>, chain_id: u64, contract_address: &str) -> Self {
        Self {
            provider,
            chain_id,
            contract_address: contract_address.to_lowercase(),
        }
    }

    /// Reads the three per-candidate counters and the contract-reported total.
    pub async fn load_tally(&self) -> Result<VoteTally, VoteError> {
        self.check_ready().await?;

        let votes = decode_words(&self.call(&encode_call(SIG_GET_VOTES, &[])).await?)?;
        if votes.len() < 3 {
            return Err(VoteError::Internal(
                "Short getVotes() response from contract".to_string(),
            ));
        }

        let total = decode_words(&self.call(&encode_call(SIG_TOTAL_VOTES, &[])).await?)?;
        let total = total
            .first()
            .map(word_to_u64)
            .ok_or_else(|| VoteError::Internal("Empty totalVotes() response".to_string()))?;

        Ok(VoteTally {
            candidate1: word_to_u64(&votes[0]),
            candidate2: word_to_u64(&votes[1]),
            candidate3: word_to_u64(&votes[2]),
            total,
        })
    }

    /// False for an empty address, without touching the network.
    pub async fn has_voted(&self, address: &str) -> Result<bool, VoteError> {
        if address.is_empty() {
            return Ok(false);
        }

        self.check_ready().await?;

        let words = decode_words(
            &self
                .call(&encode_call(SIG_HAS_VOTED, &[word_from_address(address)?]))
                .await?,
        )?;

        Ok(words.first().map(word_to_bool).unwrap_or(false))
    }

    pub async fn vote_info(&self, address: &str) -> Result<VoterRecord, VoteError> {
        self.check_ready().await?;

        let words = decode_words(
            &self
                .call(&encode_call(SIG_GET_VOTE_INFO, &[word_from_address(address)?]))
                .await?,
        )?;
        if words.len() < 3 {
            return Err(VoteError::Internal(
                "Short getVoteInfo() response from contract".to_string(),
            ));
        }

        Ok(VoterRecord {
            has_voted: word_to_bool(&words[0]),
            candidate_index: word_to_u8(&words[1]),
            timestamp: word_to_u64(&words[2]),
        })
    }

    /// Which candidate this address voted for, `None` if it has not voted or
    /// the stored index is out of range (unexpected contract data is
    /// tolerated, not crashed on).
    pub async fn get_voted_candidate(
        &self,
        address: &str,
    ) -> Result<Option<CandidateKey>, VoteError> {
        if address.is_empty() {
            return Ok(None);
        }

        let record = self.vote_info(address).await?;
        if !record.has_voted {
            return Ok(None);
        }

        Ok(CandidateKey::from_index(record.candidate_index))
    }

    /// Submits the vote transaction and waits for its confirmation, then
    /// returns the refreshed tally.
    ///
    /// Confirmation latency is block time plus wallet latency; there is
    /// deliberately no timeout here, the caller owns pending feedback.
    pub async fn cast_vote(
        &self,
        key: CandidateKey,
        address: &str,
    ) -> Result<VoteTally, VoteError> {
        if address.is_empty() {
            return Err(VoteError::NotConnected);
        }

        self.check_ready().await?;

        let data = encode_call(SIG_VOTE, &[word_from_u8(key.index())]);
        let tx_hash = self
            .provider
            .request(
                "eth_sendTransaction",
                json!([{
                    "from": address,
                    "to": self.contract_address,
                    "data": data,
                }]),
            )
            .await
            .map_err(rpc_failure)?;

        let tx_hash = tx_hash
            .as_str()
            .ok_or_else(|| VoteError::Internal("Unexpected transaction hash".to_string()))?
            .to_string();

        info!("Vote transaction {tx_hash} submitted, waiting for confirmation");
        self.wait_for_receipt(&tx_hash).await?;
        info!("Vote transaction {tx_hash} confirmed");

        self.load_tally().await
    }

    async fn wait_for_receipt(&self, tx_hash: &str) -> Result<(), VoteError> {
        loop {
            let receipt = self
                .provider
                .request("eth_getTransactionReceipt", json!([tx_hash]))
                .await
                .map_err(rpc_failure)?;

            if receipt.is_null() {
                sleep(RECEIPT_POLL_INTERVAL).await;
                continue;
            }

            let status = receipt.get("status").and_then(Value::as_str).unwrap_or("0x1");
            if status != "0x1" {
                return Err(VoteError::Internal(format!(
                    "Vote transaction {tx_hash} reverted"
                )));
            }

            return Ok(());
        }
    }

    async fn check_ready(&self) -> Result<(), VoteError> {
        let chain = self
            .provider
            .request("eth_chainId", json!([]))
            .await
            .map_err(rpc_failure)?;
        let current = parse_chain_id(&chain)?;

        if current != self.chain_id {
            return Err(VoteError::WrongNetwork {
                expected: self.chain_id,
                actual: format!("0x{current:x}"),
            });
        }

        let code = self
            .provider
            .request("eth_getCode", json!([self.contract_address, "latest"]))
            .await
            .map_err(rpc_failure)?;

        match code.as_str() {
            None | Some("") | Some("0x") => {
                Err(VoteError::ContractNotFound(self.contract_address.clone()))
            }
            Some(_) => Ok(()),
        }
    }

    async fn call(&self, data: &str) -> Result<Value, VoteError> {
        self.provider
            .request(
                "eth_call",
                json!([{ "to": self.contract_address, "data": data }, "latest"]),
            )
            .await
            .map_err(rpc_failure)
    }
}

fn rpc_failure(err: RpcError) -> VoteError {
    VoteError::Internal(err.message)
}

pub(crate) fn selector(signature: &str) -> [u8; 4] {
    let digest = Keccak256::digest(signature.as_bytes());

    [digest[0], digest[1], digest[2], digest[3]]
}

pub(crate) fn encode_call(signature: &str, args: &[[u8; 32]]) -> String {
    let mut data = selector(signature).to_vec();
    for arg in args {
        data.extend_from_slice(arg);
    }

    format!("0x{}", hex::encode(data))
}

fn word_from_u8(value: u8) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[31] = value;

    word
}

fn word_from_address(address: &str) -> Result<[u8; 32], VoteError> {
    let bytes =
        hex::decode(address.trim_start_matches("0x")).map_err(|_| VoteError::InvalidAddress)?;
    if bytes.len() != 20 {
        return Err(VoteError::InvalidAddress);
    }

    let mut word = [0u8; 32];
    word[12..].copy_from_slice(&bytes);

    Ok(word)
}

fn decode_words(result: &Value) -> Result<Vec<[u8; 32]>, VoteError> {
    let raw = result
        .as_str()
        .ok_or_else(|| VoteError::Internal("Non-string eth_call response".to_string()))?;
    let bytes = hex::decode(raw.trim_start_matches("0x"))
        .map_err(|e| VoteError::Internal(format!("Undecodable eth_call response: {e}")))?;

    Ok(bytes
        .chunks_exact(32)
        .map(|chunk| {
            let mut word = [0u8; 32];
            word.copy_from_slice(chunk);
            word
        })
        .collect())
}

fn word_to_u64(word: &[u8; 32]) -> u64 {
    let mut tail = [0u8; 8];
    tail.copy_from_slice(&word[24..]);

    u64::from_be_bytes(tail)
}

fn word_to_bool(word: &[u8; 32]) -> bool {
    word.iter().any(|b| *b != 0)
}

fn word_to_u8(word: &[u8; 32]) -> u8 {
    word[31]
}
