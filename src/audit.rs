//! Hash-chained transition history.
//!
//! Every row stores the hash of the row before it for the same entry, so an
//! edited or removed row breaks the chain even if the database triggers that
//! forbid UPDATE and DELETE were bypassed.

use std::fmt::{self, Write as _};

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::db::TransitionRow;
use crate::domain::status::SampleStatus;

pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

pub struct ChainLink<'a> {
    pub prev_hash: &'a str,
    pub entry_id: &'a str,
    pub from: Option<&'a str>,
    pub to: &'a str,
    pub actor_user: &'a str,
    pub actor_role: &'a str,
    pub remark: Option<&'a str>,
    pub occurred_at: &'a str,
}

impl<'a> From<&'a TransitionRow> for ChainLink<'a> {
    fn from(row: &'a TransitionRow) -> Self {
        Self {
            prev_hash: &row.prev_hash,
            entry_id: &row.entry_id,
            from: row.from_status.as_deref(),
            to: &row.to_status,
            actor_user: &row.actor_user,
            actor_role: &row.actor_role,
            remark: row.remark.as_deref(),
            occurred_at: &row.occurred_at,
        }
    }
}

pub fn chain_hash(link: &ChainLink<'_>) -> String {
    let mut hasher = Sha256::new();
    for part in [
        link.prev_hash,
        link.entry_id,
        link.from.unwrap_or(""),
        link.to,
        link.actor_user,
        link.actor_role,
        link.remark.unwrap_or(""),
        link.occurred_at,
    ] {
        hasher.update(part.as_bytes());
        hasher.update(b"|");
    }
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(out, "{:02x}", byte);
    }
    out
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TransitionRecord {
    pub seq: i64,
    pub event_id: String,
    pub entry_id: String,
    pub from: Option<String>,
    pub to: String,
    pub actor_user: String,
    pub actor_role: String,
    pub remark: Option<String>,
    pub occurred_at: String,
    pub hash: String,
}

impl From<TransitionRow> for TransitionRecord {
    fn from(row: TransitionRow) -> Self {
        Self {
            seq: row.seq,
            event_id: row.event_id,
            entry_id: row.entry_id,
            from: row.from_status,
            to: row.to_status,
            actor_user: row.actor_user,
            actor_role: row.actor_role,
            remark: row.remark,
            occurred_at: row.occurred_at,
            hash: row.hash,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum AuditIssue {
    Empty,
    BadGenesis { seq: i64 },
    BrokenLink { seq: i64 },
    HashMismatch { seq: i64 },
    Discontinuity {
        seq: i64,
        expected_from: String,
        found_from: Option<String>,
    },
    StatusMismatch { logged: String, current: String },
    MissingJournal { seq: i64, event_id: String },
}

impl fmt::Display for AuditIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditIssue::Empty => f.write_str("no transition records"),
            AuditIssue::BadGenesis { seq } => {
                write!(f, "record {seq}: first record must create the entry in {}", SampleStatus::INITIAL)
            }
            AuditIssue::BrokenLink { seq } => {
                write!(f, "record {seq}: prev_hash does not match the previous record")
            }
            AuditIssue::HashMismatch { seq } => {
                write!(f, "record {seq}: stored hash does not match its contents")
            }
            AuditIssue::Discontinuity {
                seq,
                expected_from,
                found_from,
            } => write!(
                f,
                "record {seq}: expected from {expected_from}, found {}",
                found_from.as_deref().unwrap_or("<none>")
            ),
            AuditIssue::StatusMismatch { logged, current } => {
                write!(f, "last logged status {logged} differs from current status {current}")
            }
            AuditIssue::MissingJournal { seq, event_id } => {
                write!(f, "record {seq}: journal event {event_id} is missing or differs")
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AuditReport {
    pub entry_id: String,
    pub records: usize,
    pub issues: Vec<AuditIssue>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Re-derive the chain for one entry's rows (in seq order) and check that
/// each record starts where the previous one ended.
pub fn verify_chain(rows: &[TransitionRow], current_status: &str) -> Vec<AuditIssue> {
    let Some(first) = rows.first() else {
        return vec![AuditIssue::Empty];
    };

    let mut issues = Vec::new();
    if first.from_status.is_some() || first.to_status != SampleStatus::INITIAL.as_str() {
        issues.push(AuditIssue::BadGenesis { seq: first.seq });
    }

    let mut expected_prev = GENESIS_HASH;
    let mut previous_to: Option<&str> = None;
    for row in rows {
        if row.prev_hash != expected_prev {
            issues.push(AuditIssue::BrokenLink { seq: row.seq });
        }
        if chain_hash(&ChainLink::from(row)) != row.hash {
            issues.push(AuditIssue::HashMismatch { seq: row.seq });
        }
        if let Some(expected_from) = previous_to {
            if row.from_status.as_deref() != Some(expected_from) {
                issues.push(AuditIssue::Discontinuity {
                    seq: row.seq,
                    expected_from: expected_from.to_string(),
                    found_from: row.from_status.clone(),
                });
            }
        }
        expected_prev = &row.hash;
        previous_to = Some(&row.to_status);
    }

    if let Some(logged) = previous_to {
        if logged != current_status {
            issues.push(AuditIssue::StatusMismatch {
                logged: logged.to_string(),
                current: current_status.to_string(),
            });
        }
    }
    issues
}
