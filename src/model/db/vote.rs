use std::ops::Deref;

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::anonymize::{VerificationCode, VoterHash};
use crate::model::mongodb::Id;

/// Core vote data, as stored in the database. The voter is only ever present
/// as their pseudonymous hash; there is no reference back to the user record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteCore {
    pub election_id: Id,
    pub voter_hash: VoterHash,
    /// Encrypted choice payload, opaque to the store.
    pub encrypted_choice: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub cast_at: DateTime<Utc>,
    pub verification_code: VerificationCode,
}

impl VoteCore {
    /// Assemble a vote being cast now, deriving its verification code.
    pub fn new(election_id: Id, voter_hash: VoterHash, encrypted_choice: String) -> Self {
        let cast_at = Utc::now();
        let verification_code = VerificationCode::generate(&voter_hash, cast_at);
        Self {
            election_id,
            voter_hash,
            encrypted_choice,
            cast_at,
            verification_code,
        }
    }

    /// Replace the verification code after a collision with a stored vote.
    pub fn regenerate_code(&mut self) {
        self.verification_code = VerificationCode::regenerate(&self.voter_hash, self.cast_at);
    }
}

/// A vote without an ID.
pub type NewVote = VoteCore;

/// A vote from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vote {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub vote: VoteCore,
}

impl Deref for Vote {
    type Target = VoteCore;

    fn deref(&self) -> &Self::Target {
        &self.vote
    }
}
