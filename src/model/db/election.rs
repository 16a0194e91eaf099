use std::ops::{Deref, DerefMut};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use mongodb::bson::{to_bson, Bson};
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// States in the election lifecycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElectionState {
    /// Under construction; never accepts votes.
    Draft,
    /// Open for voting while the current time is inside the election window.
    Active,
    /// Closed by an admin.
    Completed,
}

impl Default for ElectionState {
    fn default() -> Self {
        Self::Draft
    }
}

impl From<ElectionState> for Bson {
    fn from(state: ElectionState) -> Self {
        to_bson(&state).expect("Serialisation is infallible")
    }
}

impl FromStr for ElectionState {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            _ => Err(()),
        }
    }
}

/// Core election data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectionCore {
    pub title: String,
    pub description: Option<String>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub start_date: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub end_date: DateTime<Utc>,
    pub status: ElectionState,
    pub created_by: Option<Id>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl ElectionCore {
    /// True if votes are accepted at the given instant: the election must be
    /// active and the instant inside `[start_date, end_date)`.
    pub fn accepts_votes_at(&self, now: DateTime<Utc>) -> bool {
        self.status == ElectionState::Active && self.start_date <= now && now < self.end_date
    }

    /// True once public results may be released.
    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        self.end_date <= now
    }
}

/// An election without an ID.
pub type NewElection = ElectionCore;

/// An election from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Election {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub election: ElectionCore,
}

impl Deref for Election {
    type Target = ElectionCore;

    fn deref(&self) -> &Self::Target {
        &self.election
    }
}

impl DerefMut for Election {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.election
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use chrono::Duration;

    use super::*;

    impl ElectionCore {
        /// An election currently accepting votes.
        pub fn active_example() -> Self {
            Self {
                title: "Student Union President".to_string(),
                description: Some("Annual election for the union presidency".to_string()),
                start_date: Utc::now() - Duration::hours(1),
                end_date: Utc::now() + Duration::hours(1),
                status: ElectionState::Active,
                created_by: None,
                created_at: Utc::now(),
            }
        }

        /// An active election whose window has not opened yet.
        pub fn future_example() -> Self {
            Self {
                title: "Budget Referendum".to_string(),
                description: None,
                start_date: Utc::now() + Duration::days(1),
                end_date: Utc::now() + Duration::days(2),
                status: ElectionState::Active,
                created_by: None,
                created_at: Utc::now(),
            }
        }

        /// An election whose window has already closed.
        pub fn past_example() -> Self {
            Self {
                title: "Last Year's Board".to_string(),
                description: Some("Board member election".to_string()),
                start_date: Utc::now() - Duration::days(2),
                end_date: Utc::now() - Duration::days(1),
                status: ElectionState::Active,
                created_by: None,
                created_at: Utc::now() - Duration::days(3),
            }
        }

        /// A draft election inside its window; still not open for votes.
        pub fn draft_example() -> Self {
            Self {
                status: ElectionState::Draft,
                ..Self::active_example()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vote_window() {
        let now = Utc::now();

        assert!(ElectionCore::active_example().accepts_votes_at(now));
        assert!(!ElectionCore::draft_example().accepts_votes_at(now));
        assert!(!ElectionCore::future_example().accepts_votes_at(now));
        assert!(!ElectionCore::past_example().accepts_votes_at(now));

        // The end instant itself is outside the window.
        let election = ElectionCore::active_example();
        assert!(!election.accepts_votes_at(election.end_date));
        // The start instant is inside.
        assert!(election.accepts_votes_at(election.start_date));
    }

    #[test]
    fn results_release() {
        let now = Utc::now();
        assert!(ElectionCore::past_example().has_ended(now));
        assert!(!ElectionCore::active_example().has_ended(now));
    }
}
