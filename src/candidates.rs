//! The fixed candidate set and its contract-side index mapping.
//!
//! The contract stores votes in a `uint256[3]` keyed by zero-based index; the
//! rest of the application speaks in the three named keys. The mapping is
//! total and fixed, any other key is rejected before an index is ever looked
//! up.

use serde::Serialize;

use crate::{address::percentage, error::VoteError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateKey {
    Candidate1,
    Candidate2,
    Candidate3,
}

impl CandidateKey {
    pub const ALL: [CandidateKey; 3] = [
        CandidateKey::Candidate1,
        CandidateKey::Candidate2,
        CandidateKey::Candidate3,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CandidateKey::Candidate1 => "candidate1",
            CandidateKey::Candidate2 => "candidate2",
            CandidateKey::Candidate3 => "candidate3",
        }
    }

    /// Zero-based index the contract uses for this candidate.
    pub fn index(self) -> u8 {
        match self {
            CandidateKey::Candidate1 => 0,
            CandidateKey::Candidate2 => 1,
            CandidateKey::Candidate3 => 2,
        }
    }

    /// Maps a stored index back to a key. Out-of-range contract data is
    /// tolerated by returning `None` instead of crashing.
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(CandidateKey::Candidate1),
            1 => Some(CandidateKey::Candidate2),
            2 => Some(CandidateKey::Candidate3),
            _ => None,
        }
    }

    pub fn parse(key: &str) -> Result<Self, VoteError> {
        match key {
            "candidate1" => Ok(CandidateKey::Candidate1),
            "candidate2" => Ok(CandidateKey::Candidate2),
            "candidate3" => Ok(CandidateKey::Candidate3),
            other => Err(VoteError::InvalidCandidate(other.to_string())),
        }
    }
}

/// Static candidate metadata. Defined once as configuration, never created or
/// destroyed at runtime.
pub struct Candidate {
    pub id: CandidateKey,
    pub name: &'static str,
    pub party: &'static str,
    pub icon: &'static str,
}

pub const CANDIDATES: [Candidate; 3] = [
    Candidate {
        id: CandidateKey::Candidate1,
        name: "Candidate A",
        party: "Progress Party",
        icon: "🔵",
    },
    Candidate {
        id: CandidateKey::Candidate2,
        name: "Candidate B",
        party: "Prosperity Party",
        icon: "🟢",
    },
    Candidate {
        id: CandidateKey::Candidate3,
        name: "Candidate C",
        party: "Reform Party",
        icon: "🟡",
    },
];

pub fn candidate(key: CandidateKey) -> &'static Candidate {
    &CANDIDATES[key.index() as usize]
}

/// Per-candidate counters plus the contract-reported total.
///
/// The total is read from the contract rather than summed locally; the two are
/// expected to agree but the contract's number wins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VoteTally {
    pub candidate1: u64,
    pub candidate2: u64,
    pub candidate3: u64,
    pub total: u64,
}

impl VoteTally {
    pub fn count(&self, key: CandidateKey) -> u64 {
        match key {
            CandidateKey::Candidate1 => self.candidate1,
            CandidateKey::Candidate2 => self.candidate2,
            CandidateKey::Candidate3 => self.candidate3,
        }
    }

    pub fn share(&self, key: CandidateKey) -> String {
        percentage(self.count(key), self.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_index_round_trip() {
        for key in CandidateKey::ALL {
            assert_eq!(CandidateKey::from_index(key.index()), Some(key));
            assert_eq!(CandidateKey::parse(key.as_str()).unwrap(), key);
        }
    }

    #[test]
    fn unknown_key_rejected_before_mapping() {
        assert!(matches!(
            CandidateKey::parse("candidate4"),
            Err(VoteError::InvalidCandidate(_))
        ));
        assert!(matches!(
            CandidateKey::parse(""),
            Err(VoteError::InvalidCandidate(_))
        ));
    }

    #[test]
    fn out_of_range_index_is_none() {
        assert_eq!(CandidateKey::from_index(3), None);
        assert_eq!(CandidateKey::from_index(255), None);
    }

    #[test]
    fn tally_shares() {
        let tally = VoteTally {
            candidate1: 1,
            candidate2: 1,
            candidate3: 2,
            total: 4,
        };

        assert_eq!(tally.share(CandidateKey::Candidate1), "25.0");
        assert_eq!(tally.share(CandidateKey::Candidate3), "50.0");
        assert_eq!(VoteTally::default().share(CandidateKey::Candidate1), "0.0");
    }

    #[test]
    fn metadata_covers_all_keys() {
        for key in CandidateKey::ALL {
            assert_eq!(candidate(key).id, key);
        }
    }
}
