use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::db::ballot::{Ballot, BallotOption, NewBallot, NewBallotOption};
use crate::model::db::election::{Election, ElectionCore, ElectionState, NewElection};
use crate::model::db::user::User;
use crate::model::mongodb::{serde_id_string, Id};

/// Admin-supplied definition of a new election.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionSpec {
    pub title: String,
    pub description: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(default)]
    pub status: ElectionState,
}

impl ElectionSpec {
    /// Turn the spec into a storable election created by the given admin.
    pub fn into_election(self, created_by: Option<Id>) -> NewElection {
        NewElection {
            title: self.title,
            description: self.description,
            start_date: self.start_date,
            end_date: self.end_date,
            status: self.status,
            created_by,
            created_at: Utc::now(),
        }
    }
}

/// Admin-supplied partial update; absent fields keep their stored values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub status: Option<ElectionState>,
}

impl ElectionUpdate {
    /// Apply the update in place.
    pub fn apply(self, election: &mut ElectionCore) {
        if let Some(title) = self.title {
            election.title = title;
        }
        if let Some(description) = self.description {
            election.description = Some(description);
        }
        if let Some(start_date) = self.start_date {
            election.start_date = start_date;
        }
        if let Some(end_date) = self.end_date {
            election.end_date = end_date;
        }
        if let Some(status) = self.status {
            election.status = status;
        }
    }
}

/// A single election in a listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionSummary {
    #[serde(with = "serde_id_string")]
    pub id: Id,
    pub title: String,
    pub description: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: ElectionState,
}

impl From<Election> for ElectionSummary {
    fn from(election: Election) -> Self {
        Self {
            id: election.id,
            title: election.election.title,
            description: election.election.description,
            start_date: election.election.start_date,
            end_date: election.election.end_date,
            status: election.election.status,
        }
    }
}

/// Full public view of an election: the summary plus its creator and its
/// ballots with their ordered options.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionDescription {
    #[serde(flatten)]
    pub summary: ElectionSummary,
    pub created_at: DateTime<Utc>,
    pub creator_email: Option<String>,
    pub creator_name: Option<String>,
    pub ballots: Vec<BallotDescription>,
}

impl ElectionDescription {
    pub fn assemble(
        election: Election,
        creator: Option<User>,
        ballots: Vec<BallotDescription>,
    ) -> Self {
        let created_at = election.created_at;
        Self {
            summary: election.into(),
            created_at,
            creator_email: creator.as_ref().map(|user| user.email.clone()),
            creator_name: creator.map(|user| user.user.full_name),
            ballots,
        }
    }
}

/// Admin-supplied definition of a new ballot with its options, in display
/// order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BallotSpec {
    pub title: String,
    pub instructions: Option<String>,
    pub options: Vec<OptionSpec>,
}

impl BallotSpec {
    /// Turn the spec into a storable ballot for the given election; options
    /// are produced separately once the ballot ID is known.
    pub fn into_ballot(self, election_id: Id) -> (NewBallot, Vec<String>) {
        let option_texts = self.options.into_iter().map(|option| option.text).collect();
        (
            NewBallot::new(election_id, self.title, self.instructions),
            option_texts,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionSpec {
    pub text: String,
}

/// Build the option rows for a freshly inserted ballot, numbering them from 1
/// in the order they were supplied.
pub fn options_for_ballot(ballot_id: Id, option_texts: Vec<String>) -> Vec<NewBallotOption> {
    option_texts
        .into_iter()
        .enumerate()
        .map(|(index, text)| NewBallotOption::new(ballot_id, text, index as u32 + 1))
        .collect()
}

/// A ballot with its options, in display order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BallotDescription {
    #[serde(with = "serde_id_string")]
    pub id: Id,
    pub title: String,
    pub instructions: Option<String>,
    pub options: Vec<OptionDescription>,
}

impl BallotDescription {
    pub fn assemble(ballot: Ballot, mut options: Vec<BallotOption>) -> Self {
        options.sort_by_key(|option| option.option_order);
        Self {
            id: ballot.id,
            title: ballot.ballot.title,
            instructions: ballot.ballot.instructions,
            options: options.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionDescription {
    #[serde(with = "serde_id_string")]
    pub id: Id,
    pub text: String,
    pub order: u32,
}

impl From<BallotOption> for OptionDescription {
    fn from(option: BallotOption) -> Self {
        Self {
            id: option.id,
            text: option.option.option_text,
            order: option.option.option_order,
        }
    }
}
