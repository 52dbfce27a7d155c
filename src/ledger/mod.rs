use std::collections::BTreeMap;

use reelvote_core::points::PointEventKind;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

pub type Address = String;
pub type ReceiptId = [u8; 32];

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("duplicate receipt {0}")]
    DuplicateReceipt(String),
    #[error("snapshot merkle root mismatch: recorded {recorded}, computed {computed}")]
    SnapshotMismatch { recorded: String, computed: String },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Profile {
    pub points: u64,
    pub votes: u64,
    pub comments: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetadata {
    pub height: u64,
    pub timestamp: i64,
    #[serde(default, with = "serde_hex_opt")]
    pub previous_receipt: Option<ReceiptId>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PointEvent {
    pub address: Address,
    pub kind: PointEventKind,
    pub delta: u64,
    pub timestamp: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSnapshot {
    pub meta: SnapshotMetadata,
    pub profiles: BTreeMap<Address, Profile>,
    pub events: Vec<PointEvent>,
    /// Hex receipt ids already applied.
    #[serde(default)]
    pub receipts: Vec<String>,
    #[serde(with = "serde_hex")]
    pub merkle_root: [u8; 32],
}

impl Default for LedgerSnapshot {
    fn default() -> Self {
        PointsLedger::new().snapshot()
    }
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub address: Address,
    pub points: u64,
    pub votes: u64,
    pub comments: u64,
}

/// Points per address plus the append-only event log behind them.
#[derive(Debug, Default)]
pub struct PointsLedger {
    pub meta: SnapshotMetadata,
    pub profiles: BTreeMap<Address, Profile>,
    pub events: Vec<PointEvent>,
    applied_receipts: BTreeMap<ReceiptId, ()>,
}

impl PointsLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a ledger from a snapshot after checking its merkle root.
    pub fn from_snapshot(snapshot: LedgerSnapshot) -> Result<Self, LedgerError> {
        let computed = compute_merkle_root(&snapshot.profiles);
        if computed != snapshot.merkle_root {
            return Err(LedgerError::SnapshotMismatch {
                recorded: hex::encode(snapshot.merkle_root),
                computed: hex::encode(computed),
            });
        }
        let mut applied_receipts = BTreeMap::new();
        for receipt in &snapshot.receipts {
            if let Some(id) = decode_receipt(receipt) {
                applied_receipts.insert(id, ());
            }
        }
        Ok(Self {
            meta: snapshot.meta,
            profiles: snapshot.profiles,
            events: snapshot.events,
            applied_receipts,
        })
    }

    pub fn profile(&self, address: &str) -> Profile {
        self.profiles.get(address).cloned().unwrap_or_default()
    }

    /// Credit `address` for one event. A receipt seen before is rejected and
    /// leaves the ledger untouched.
    pub fn record_event(
        &mut self,
        address: &str,
        kind: PointEventKind,
        receipt: Option<ReceiptId>,
        timestamp: i64,
    ) -> Result<Profile, LedgerError> {
        if let Some(id) = receipt {
            if self.applied_receipts.contains_key(&id) {
                return Err(LedgerError::DuplicateReceipt(hex::encode(id)));
            }
        }

        let delta = kind.delta();
        let profile = self.profiles.entry(address.to_string()).or_default();
        profile.points += delta;
        match kind {
            PointEventKind::Vote => profile.votes += 1,
            PointEventKind::Comment => profile.comments += 1,
        }
        let updated = profile.clone();
        self.events.push(PointEvent {
            address: address.to_string(),
            kind,
            delta,
            timestamp,
        });

        self.meta.height += 1;
        self.meta.timestamp = timestamp;
        if let Some(id) = receipt {
            self.meta.previous_receipt = Some(id);
            self.applied_receipts.insert(id, ());
        }
        debug!("{address} +{delta} ({}) -> {}", kind.as_str(), updated.points);
        Ok(updated)
    }

    /// Top `limit` profiles by points; ties go to the smaller address.
    pub fn leaderboard(&self, limit: usize) -> Vec<LeaderboardEntry> {
        let mut entries: Vec<LeaderboardEntry> = self
            .profiles
            .iter()
            .map(|(address, profile)| LeaderboardEntry {
                address: address.clone(),
                points: profile.points,
                votes: profile.votes,
                comments: profile.comments,
            })
            .collect();
        entries.sort_by(|a, b| b.points.cmp(&a.points).then_with(|| a.address.cmp(&b.address)));
        entries.truncate(limit);
        entries
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            meta: self.meta.clone(),
            profiles: self.profiles.clone(),
            events: self.events.clone(),
            receipts: self.applied_receipts.keys().map(hex::encode).collect(),
            merkle_root: compute_merkle_root(&self.profiles),
        }
    }
}

/// Receipt id for an external event id.
pub fn receipt_for(event_id: &str) -> ReceiptId {
    let mut hasher = Sha256::new();
    hasher.update(b"event");
    hasher.update(event_id.as_bytes());
    hasher.finalize().into()
}

pub fn decode_receipt(value: &str) -> Option<ReceiptId> {
    hex::decode(value).ok()?.try_into().ok()
}

fn compute_merkle_root(profiles: &BTreeMap<Address, Profile>) -> [u8; 32] {
    let leaves: Vec<[u8; 32]> = profiles
        .iter()
        .map(|(address, profile)| -> [u8; 32] {
            let mut hasher = Sha256::new();
            hasher.update(b"profile");
            hasher.update(address.as_bytes());
            hasher.update(profile.points.to_le_bytes());
            hasher.update(profile.votes.to_le_bytes());
            hasher.update(profile.comments.to_le_bytes());
            hasher.finalize().into()
        })
        .collect();
    build_merkle(leaves)
}

fn build_merkle(mut leaves: Vec<[u8; 32]>) -> [u8; 32] {
    if leaves.is_empty() {
        return Sha256::digest(b"reelvote-ledger-empty").into();
    }
    while leaves.len() > 1 {
        let mut next: Vec<[u8; 32]> = Vec::with_capacity(leaves.len().div_ceil(2));
        for chunk in leaves.chunks(2) {
            let mut hasher = Sha256::new();
            hasher.update(b"node");
            hasher.update(chunk[0]);
            hasher.update(chunk.get(1).unwrap_or(&chunk[0]));
            next.push(hasher.finalize().into());
        }
        leaves = next;
    }
    leaves[0]
}

mod serde_hex {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 32], D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        super::decode_receipt(&encoded).ok_or_else(|| D::Error::custom("expected 32 hex-encoded bytes"))
    }
}

mod serde_hex_opt {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<[u8; 32]>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(bytes) => serializer.serialize_some(&hex::encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<[u8; 32]>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            Some(encoded) => super::decode_receipt(&encoded)
                .map(Some)
                .ok_or_else(|| D::Error::custom("expected 32 hex-encoded bytes")),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merkle_root_is_deterministic() {
        let mut ledger = PointsLedger::new();
        ledger.record_event("alice", PointEventKind::Vote, None, 1).unwrap();
        ledger.record_event("bob", PointEventKind::Comment, None, 2).unwrap();
        let root1 = ledger.snapshot().merkle_root;
        let root2 = ledger.snapshot().merkle_root;
        assert_eq!(root1, root2);
        assert_ne!(root1, PointsLedger::new().snapshot().merkle_root);
    }

    #[test]
    fn events_update_profiles_and_log() {
        let mut ledger = PointsLedger::new();
        ledger.record_event("0xA", PointEventKind::Vote, None, 10).unwrap();
        let profile = ledger
            .record_event("0xA", PointEventKind::Comment, None, 11)
            .unwrap();
        assert_eq!(
            profile,
            Profile {
                points: 3,
                votes: 1,
                comments: 1
            }
        );
        assert_eq!(ledger.events.len(), 2);
        assert_eq!(ledger.events[1].delta, 2);
        assert_eq!(ledger.meta.height, 2);
        assert_eq!(ledger.meta.timestamp, 11);
    }

    #[test]
    fn duplicate_receipts_are_rejected_without_side_effects() {
        let mut ledger = PointsLedger::new();
        let receipt = receipt_for("comment-17");
        ledger
            .record_event("0xA", PointEventKind::Comment, Some(receipt), 1)
            .unwrap();
        let err = ledger
            .record_event("0xA", PointEventKind::Comment, Some(receipt), 2)
            .unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateReceipt(_)));
        assert_eq!(ledger.profile("0xA").points, 2);
        assert_eq!(ledger.events.len(), 1);
    }

    #[test]
    fn leaderboard_orders_by_points_then_address() {
        let mut ledger = PointsLedger::new();
        ledger.record_event("carol", PointEventKind::Vote, None, 1).unwrap();
        ledger.record_event("bob", PointEventKind::Comment, None, 1).unwrap();
        ledger.record_event("alice", PointEventKind::Comment, None, 1).unwrap();
        let board = ledger.leaderboard(2);
        let names: Vec<_> = board.iter().map(|e| e.address.as_str()).collect();
        assert_eq!(names, vec!["alice", "bob"]);
    }

    #[test]
    fn snapshot_restores_receipts() {
        let mut ledger = PointsLedger::new();
        let receipt = receipt_for("vote-1");
        ledger
            .record_event("0xA", PointEventKind::Vote, Some(receipt), 5)
            .unwrap();
        let json = serde_json::to_string(&ledger.snapshot()).unwrap();
        let snapshot: LedgerSnapshot = serde_json::from_str(&json).unwrap();
        let mut restored = PointsLedger::from_snapshot(snapshot).unwrap();
        assert_eq!(restored.profile("0xA").points, 1);
        assert_eq!(restored.meta.previous_receipt, Some(receipt));
        assert!(restored
            .record_event("0xA", PointEventKind::Vote, Some(receipt), 6)
            .is_err());
    }

    #[test]
    fn tampered_snapshot_is_refused() {
        let mut ledger = PointsLedger::new();
        ledger.record_event("0xA", PointEventKind::Vote, None, 1).unwrap();
        let mut snapshot = ledger.snapshot();
        snapshot.profiles.get_mut("0xA").unwrap().points = 1_000;
        assert!(matches!(
            PointsLedger::from_snapshot(snapshot),
            Err(LedgerError::SnapshotMismatch { .. })
        ));
    }
}
