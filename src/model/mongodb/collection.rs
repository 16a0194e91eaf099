use std::ops::Deref;

use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};
use rocket::{
    request::{self, FromRequest, Request},
    State,
};

use crate::model::db::{
    audit::{AuditLog, AuditLogCore},
    ballot::{Ballot, BallotCore, BallotOption, BallotOptionCore},
    election::{Election, ElectionCore},
    user::{User, UserCore},
    vote::{Vote, VoteCore},
};

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[rocket::async_trait]
impl<'r, T> FromRequest<'r> for Coll<T>
where
    T: MongoCollection,
{
    type Error = ();

    /// Get the database connection from the managed state and wrap it in a collection.
    ///
    /// Panics iff the [`Database`] is not managed by [`rocket::Rocket`].
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let db = req.guard::<&State<Database>>().await.unwrap();
        request::Outcome::Success(Coll::from_db(db))
    }
}

// User collections
const USERS: &str = "users";
impl MongoCollection for User {
    const NAME: &'static str = USERS;
}
impl MongoCollection for UserCore {
    const NAME: &'static str = USERS;
}

// Election collections
const ELECTIONS: &str = "elections";
impl MongoCollection for Election {
    const NAME: &'static str = ELECTIONS;
}
impl MongoCollection for ElectionCore {
    const NAME: &'static str = ELECTIONS;
}

// Ballot collections
const BALLOTS: &str = "ballots";
impl MongoCollection for Ballot {
    const NAME: &'static str = BALLOTS;
}
impl MongoCollection for BallotCore {
    const NAME: &'static str = BALLOTS;
}

// Ballot option collections
const BALLOT_OPTIONS: &str = "ballot_options";
impl MongoCollection for BallotOption {
    const NAME: &'static str = BALLOT_OPTIONS;
}
impl MongoCollection for BallotOptionCore {
    const NAME: &'static str = BALLOT_OPTIONS;
}

// Vote collections
const VOTES: &str = "votes";
impl MongoCollection for Vote {
    const NAME: &'static str = VOTES;
}
impl MongoCollection for VoteCore {
    const NAME: &'static str = VOTES;
}

// Audit log collections
const AUDIT_LOGS: &str = "audit_logs";
impl MongoCollection for AuditLog {
    const NAME: &'static str = AUDIT_LOGS;
}
impl MongoCollection for AuditLogCore {
    const NAME: &'static str = AUDIT_LOGS;
}

/// One account per email address.
pub const UNIQUE_EMAIL_INDEX: &str = "unique_user_email";
/// At most one vote per (voter hash, election) pair; this index is the
/// arbiter against duplicate votes, including concurrent submissions.
pub const UNIQUE_VOTER_ELECTION_INDEX: &str = "unique_voter_per_election";
/// Verification codes are globally unique across all votes.
pub const UNIQUE_VERIFICATION_CODE_INDEX: &str = "unique_verification_code";
/// Options are uniquely ordered within a ballot.
pub const UNIQUE_OPTION_ORDER_INDEX: &str = "unique_option_order_per_ballot";

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = |name: &str| {
        IndexOptions::builder()
            .unique(true)
            .name(name.to_string())
            .build()
    };

    // User collection.
    let email_index = IndexModel::builder()
        .keys(doc! {"email": 1})
        .options(unique(UNIQUE_EMAIL_INDEX))
        .build();
    Coll::<User>::from_db(db)
        .create_index(email_index, None)
        .await?;

    // Vote collection.
    let voter_index = IndexModel::builder()
        .keys(doc! {"voter_hash": 1, "election_id": 1})
        .options(unique(UNIQUE_VOTER_ELECTION_INDEX))
        .build();
    let code_index = IndexModel::builder()
        .keys(doc! {"verification_code": 1})
        .options(unique(UNIQUE_VERIFICATION_CODE_INDEX))
        .build();
    let election_index = IndexModel::builder()
        .keys(doc! {"election_id": 1})
        .build();
    let votes = Coll::<Vote>::from_db(db);
    votes.create_index(voter_index, None).await?;
    votes.create_index(code_index, None).await?;
    votes.create_index(election_index, None).await?;

    // Ballot option collection.
    let order_index = IndexModel::builder()
        .keys(doc! {"ballot_id": 1, "option_order": 1})
        .options(unique(UNIQUE_OPTION_ORDER_INDEX))
        .build();
    Coll::<BallotOption>::from_db(db)
        .create_index(order_index, None)
        .await?;

    // Election collection.
    let status_index = IndexModel::builder().keys(doc! {"status": 1}).build();
    Coll::<Election>::from_db(db)
        .create_index(status_index, None)
        .await?;

    // Audit log collection.
    let entity_index = IndexModel::builder()
        .keys(doc! {"entity_type": 1, "entity_id": 1})
        .build();
    Coll::<AuditLog>::from_db(db)
        .create_index(entity_index, None)
        .await?;

    Ok(())
}
