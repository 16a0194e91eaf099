use std::ops::Deref;

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Core ballot data, as stored in the database. A ballot belongs to exactly
/// one election; its options live in their own collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BallotCore {
    pub election_id: Id,
    pub title: String,
    pub instructions: Option<String>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl BallotCore {
    pub fn new(election_id: Id, title: String, instructions: Option<String>) -> Self {
        Self {
            election_id,
            title,
            instructions,
            created_at: Utc::now(),
        }
    }
}

/// A ballot without an ID.
pub type NewBallot = BallotCore;

/// A ballot from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ballot {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub ballot: BallotCore,
}

impl Deref for Ballot {
    type Target = BallotCore;

    fn deref(&self) -> &Self::Target {
        &self.ballot
    }
}

/// A single selectable option on a ballot. The `(ballot_id, option_order)`
/// pair is unique, so options are uniquely ordered within their ballot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BallotOptionCore {
    pub ballot_id: Id,
    pub option_text: String,
    pub option_order: u32,
}

impl BallotOptionCore {
    pub fn new(ballot_id: Id, option_text: String, option_order: u32) -> Self {
        Self {
            ballot_id,
            option_text,
            option_order,
        }
    }
}

/// A ballot option without an ID.
pub type NewBallotOption = BallotOptionCore;

/// A ballot option from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BallotOption {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub option: BallotOptionCore,
}

impl Deref for BallotOption {
    type Target = BallotOptionCore;

    fn deref(&self) -> &Self::Target {
        &self.option
    }
}
