use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::anonymize::VerificationCode;
use crate::model::mongodb::{serde_id_string, Id};

/// A vote submission. The choice payload is already encrypted by the client
/// and stays opaque end to end.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    #[serde(with = "serde_id_string")]
    pub election_id: Id,
    pub encrypted_choice: String,
}

/// Returned to the voter after a successful submission.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteReceipt {
    #[serde(with = "serde_id_string")]
    pub vote_id: Id,
    #[serde(rename = "timestamp")]
    pub cast_at: DateTime<Utc>,
    pub verification_code: VerificationCode,
}

/// Confirmation that a vote with a given verification code was recorded.
#[derive(Debug, Serialize, Deserialize)]
pub struct VerificationResponse {
    pub verified: bool,
    pub vote: VerifiedVote,
}

/// The public facts about a verified vote: when it was cast and in which
/// election. Never the choice, never the voter.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedVote {
    #[serde(with = "serde_id_string")]
    pub vote_id: Id,
    #[serde(with = "serde_id_string")]
    pub election_id: Id,
    pub election_title: String,
    #[serde(rename = "timestamp")]
    pub cast_at: DateTime<Utc>,
}
