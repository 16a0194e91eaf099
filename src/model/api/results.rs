use chrono::{DateTime, Utc};
use mongodb::bson::Document;
use serde::{Deserialize, Serialize};

use crate::model::anonymize::VerificationCode;
use crate::model::db::audit::{AuditAction, AuditLog};
use crate::model::db::vote::Vote;
use crate::model::mongodb::{serde_id_string, Id};

use super::election::{BallotDescription, ElectionSummary};

/// Public results of an ended election. Individual choices stay encrypted;
/// only the accepted-vote count and the ballot structure are released.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionResults {
    pub election: ElectionSummary,
    pub vote_count: u64,
    pub ballots: Vec<BallotDescription>,
}

/// A stored vote as admins see it: the encrypted payload and public
/// metadata, never the voter hash.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CastVote {
    #[serde(with = "serde_id_string")]
    pub vote_id: Id,
    pub encrypted_choice: String,
    pub cast_at: DateTime<Utc>,
    pub verification_code: VerificationCode,
}

impl From<Vote> for CastVote {
    fn from(vote: Vote) -> Self {
        Self {
            vote_id: vote.id,
            encrypted_choice: vote.vote.encrypted_choice,
            cast_at: vote.vote.cast_at,
            verification_code: vote.vote.verification_code,
        }
    }
}

/// An audit log entry as returned to admins.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub action: AuditAction,
    pub entity_type: String,
    pub ip_address: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub details: Option<Document>,
}

impl From<AuditLog> for AuditEntry {
    fn from(log: AuditLog) -> Self {
        Self {
            action: log.entry.action,
            entity_type: log.entry.entity_type,
            ip_address: log.entry.ip_address,
            timestamp: log.entry.timestamp,
            details: log.entry.details,
        }
    }
}

/// Detailed results for admins, available at any time during the election.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminElectionResults {
    pub election: ElectionSummary,
    pub votes: Vec<CastVote>,
    pub audit_logs: Vec<AuditEntry>,
}
