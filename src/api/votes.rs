use std::net::IpAddr;

use chrono::Utc;
use mongodb::bson::doc;
use rocket::{http::Status, serde::json::Json, Route, State};

use crate::{
    config::Config,
    error::{Error, Result},
    model::{
        anonymize::{VerificationCode, VoterHash},
        api::{
            auth::{AuthToken, Voter},
            vote::{VerificationResponse, VerifiedVote, VoteReceipt, VoteRequest},
        },
        db::{
            audit::{self, AuditAction, NewAuditLog},
            election::Election,
            vote::{NewVote, Vote},
        },
        mongodb::{
            retry, violates_index, Coll, Id, UNIQUE_VERIFICATION_CODE_INDEX,
            UNIQUE_VOTER_ELECTION_INDEX,
        },
    },
};

/// Number of fresh verification codes to try when one collides with a
/// stored vote.
const CODE_ATTEMPTS: u32 = 4;

pub fn routes() -> Vec<Route> {
    routes![cast_vote, verify_vote]
}

#[post("/votes", data = "<request>", format = "json")]
async fn cast_vote(
    token: AuthToken<Voter>,
    request: Json<VoteRequest>,
    elections: Coll<Election>,
    votes: Coll<NewVote>,
    logs: Coll<NewAuditLog>,
    config: &State<Config>,
    ip: Option<IpAddr>,
) -> Result<(Status, Json<VoteReceipt>)> {
    let VoteRequest {
        election_id,
        encrypted_choice,
    } = request.0;
    if encrypted_choice.is_empty() {
        return Err(Error::bad_request("Missing required field: encryptedChoice"));
    }

    // The election must be accepting votes right now.
    retry::execute(|| {
        let elections = elections.clone();
        let filter = election_id.as_doc();
        async move { elections.find_one(filter, None).await }
    })
    .await?
    .filter(|election| election.accepts_votes_at(Utc::now()))
    .ok_or_else(|| Error::bad_request("Election is not active or does not exist"))?;

    // Derive the pseudonym; the stored vote never references the user.
    let voter_hash = VoterHash::derive(token.id, election_id, config);
    let mut vote = NewVote::new(election_id, voter_hash, encrypted_choice);

    // No pre-check: the unique index on (voter_hash, election_id) is the
    // arbiter against duplicate votes, including concurrent submissions.
    // A collision on the verification code instead gets a fresh code and
    // another attempt.
    let mut attempts = 0;
    let vote_id: Id = loop {
        let result = retry::execute(|| {
            let votes = votes.clone();
            let vote = vote.clone();
            async move { votes.insert_one(vote, None).await }
        })
        .await;

        match result {
            Ok(inserted) => {
                break inserted
                    .inserted_id
                    .as_object_id()
                    .unwrap() // Valid because the ID comes directly from the DB.
                    .into();
            }
            Err(err) if violates_index(&err, UNIQUE_VOTER_ELECTION_INDEX) => {
                return Err(Error::conflict("You have already voted in this election"));
            }
            Err(err)
                if violates_index(&err, UNIQUE_VERIFICATION_CODE_INDEX)
                    && attempts < CODE_ATTEMPTS =>
            {
                attempts += 1;
                warn!("Verification code collision, regenerating ({attempts}/{CODE_ATTEMPTS})");
                vote.regenerate_code();
            }
            Err(err) => return Err(err.into()),
        }
    };

    // Log the action without revealing the voter's identity.
    audit::record(
        &logs,
        NewAuditLog::new(
            AuditAction::VoteCast,
            "election",
            Some(election_id),
            ip,
            Some(doc! { "verificationCode": vote.verification_code.to_string() }),
        ),
    )
    .await;

    Ok((
        Status::Created,
        Json(VoteReceipt {
            vote_id,
            cast_at: vote.cast_at,
            verification_code: vote.verification_code,
        }),
    ))
}

#[get("/votes/verify/<code>")]
async fn verify_vote(
    code: VerificationCode,
    votes: Coll<Vote>,
    elections: Coll<Election>,
) -> Result<Json<VerificationResponse>> {
    let vote = retry::execute(|| {
        let votes = votes.clone();
        let filter = doc! { "verification_code": code.clone() };
        async move { votes.find_one(filter, None).await }
    })
    .await?
    .ok_or_else(|| Error::not_found("Vote not found"))?;

    let election = retry::execute(|| {
        let elections = elections.clone();
        let filter = vote.election_id.as_doc();
        async move { elections.find_one(filter, None).await }
    })
    .await?
    .ok_or_else(|| Error::not_found(format!("Election {}", vote.election_id)))?;

    Ok(Json(VerificationResponse {
        verified: true,
        vote: VerifiedVote {
            vote_id: vote.id,
            election_id: vote.election_id,
            election_title: election.title.clone(),
            cast_at: vote.cast_at,
        },
    }))
}
