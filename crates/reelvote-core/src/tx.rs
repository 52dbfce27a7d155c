use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{error::ReelError, vote::validate_movie_id};

pub const VOTE_METHOD: &str = "function vote(uint256, bool)";
pub const VOTE_GAS: u64 = 300_000;

/// Argument of a contract call. Serializes as the bare JSON value.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum CallParam {
    Bool(bool),
    Uint(u64),
}

/// Call descriptor handed to a wallet or chain client for submission.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoteTransaction {
    pub method: String,
    pub params: Vec<CallParam>,
    pub gas: u64,
}

impl VoteTransaction {
    /// SHA-256 over the canonical call: method, each param, gas.
    pub fn digest(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.method.as_bytes());
        for param in &self.params {
            match param {
                CallParam::Bool(b) => {
                    hasher.update(b"bool");
                    hasher.update([*b as u8]);
                }
                CallParam::Uint(n) => {
                    hasher.update(b"uint");
                    hasher.update(n.to_le_bytes());
                }
            }
        }
        hasher.update(self.gas.to_le_bytes());
        hasher.finalize().into()
    }

    /// Recover `(movie_id, vote_type)` from a `vote(uint256, bool)` call.
    pub fn decode_vote(&self) -> Result<(u64, bool), ReelError> {
        if self.method != VOTE_METHOD {
            return Err(ReelError::UnsupportedCall(self.method.clone()));
        }
        match self.params.as_slice() {
            [CallParam::Uint(movie), CallParam::Bool(vote)] => Ok((*movie, *vote)),
            _ => Err(ReelError::UnsupportedCall(format!(
                "{} with params {:?}",
                self.method, self.params
            ))),
        }
    }
}

/// Build the `vote(uint256, bool)` call for `movie_id`. Nothing is submitted.
///
/// The id must be the canonical decimal form of the integer the call carries
/// (`"7"`, not `"007"`), so the record stored under the id and the record the
/// contract keys by the integer name the same movie.
pub fn prepare_vote_transaction(movie_id: &str, vote_type: bool) -> Result<VoteTransaction, ReelError> {
    let movie_id = validate_movie_id(movie_id)?;
    let movie: u64 = movie_id
        .parse()
        .ok()
        .filter(|movie: &u64| movie.to_string() == movie_id)
        .ok_or_else(|| ReelError::InvalidMovieId(movie_id.to_string()))?;
    Ok(VoteTransaction {
        method: VOTE_METHOD.to_string(),
        params: vec![CallParam::Uint(movie), CallParam::Bool(vote_type)],
        gas: VOTE_GAS,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepares_vote_call() {
        let tx = prepare_vote_transaction("1", true).unwrap();
        assert_eq!(
            tx,
            VoteTransaction {
                method: "function vote(uint256, bool)".into(),
                params: vec![CallParam::Uint(1), CallParam::Bool(true)],
                gas: 300_000,
            }
        );
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "method": "function vote(uint256, bool)",
                "params": [1, true],
                "gas": 300000
            })
        );
    }

    #[test]
    fn non_numeric_movie_id_is_rejected() {
        assert_eq!(
            prepare_vote_transaction("tt0111161", false),
            Err(ReelError::InvalidMovieId("tt0111161".into()))
        );
        assert!(prepare_vote_transaction("", true).is_err());
    }

    #[test]
    fn leading_zeros_are_rejected() {
        assert_eq!(
            prepare_vote_transaction("007", true),
            Err(ReelError::InvalidMovieId("007".into()))
        );
        assert!(prepare_vote_transaction("00", true).is_err());
        assert!(prepare_vote_transaction("0", true).is_ok());
        assert!(prepare_vote_transaction("70", true).is_ok());
    }

    #[test]
    fn decode_round_trips_through_json() {
        let tx = prepare_vote_transaction("42", false).unwrap();
        let parsed: VoteTransaction = serde_json::from_str(&serde_json::to_string(&tx).unwrap()).unwrap();
        assert_eq!(parsed.decode_vote().unwrap(), (42, false));
        assert_eq!(parsed.digest(), tx.digest());
    }

    #[test]
    fn foreign_calls_do_not_decode() {
        let tx = VoteTransaction {
            method: "function transfer(address, uint256)".into(),
            params: vec![],
            gas: 21_000,
        };
        assert!(matches!(tx.decode_vote(), Err(ReelError::UnsupportedCall(_))));
    }

    #[test]
    fn digest_depends_on_vote_direction() {
        let yes = prepare_vote_transaction("5", true).unwrap();
        let no = prepare_vote_transaction("5", false).unwrap();
        assert_ne!(yes.digest(), no.digest());
    }
}
