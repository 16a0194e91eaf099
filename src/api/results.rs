use chrono::Utc;
use mongodb::{bson::doc, options::FindOptions};
use rocket::{futures::TryStreamExt, serde::json::Json, Route};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            auth::{Admin, AuthToken},
            results::{AdminElectionResults, ElectionResults},
        },
        db::{
            audit::AuditLog,
            ballot::{Ballot, BallotOption},
            election::Election,
            vote::Vote,
        },
        mongodb::{retry, Coll, Id},
    },
};

use super::common::ballots_for_election;

pub fn routes() -> Vec<Route> {
    routes![election_results, admin_election_results]
}

#[get("/results/<election_id>")]
async fn election_results(
    election_id: Id,
    elections: Coll<Election>,
    votes: Coll<Vote>,
    ballots: Coll<Ballot>,
    options: Coll<BallotOption>,
) -> Result<Json<ElectionResults>> {
    let election = retry::execute(|| {
        let elections = elections.clone();
        let filter = election_id.as_doc();
        async move { elections.find_one(filter, None).await }
    })
    .await?
    .ok_or_else(|| Error::not_found(format!("Election {election_id}")))?;

    // Results stay sealed until the election is over.
    if !election.has_ended(Utc::now()) {
        return Err(Error::ResultsNotAvailable {
            end_date: election.end_date,
        });
    }

    let vote_count = retry::execute(|| {
        let votes = votes.clone();
        let filter = doc! { "election_id": election_id };
        async move { votes.count_documents(filter, None).await }
    })
    .await?;

    let ballots = ballots_for_election(&ballots, &options, election_id).await?;

    Ok(Json(ElectionResults {
        election: election.into(),
        vote_count,
        ballots,
    }))
}

#[get("/results/<election_id>/admin")]
async fn admin_election_results(
    _token: AuthToken<Admin>,
    election_id: Id,
    elections: Coll<Election>,
    votes: Coll<Vote>,
    logs: Coll<AuditLog>,
) -> Result<Json<AdminElectionResults>> {
    let election = retry::execute(|| {
        let elections = elections.clone();
        let filter = election_id.as_doc();
        async move { elections.find_one(filter, None).await }
    })
    .await?
    .ok_or_else(|| Error::not_found(format!("Election {election_id}")))?;

    let election_votes: Vec<Vote> = retry::execute(|| {
        let votes = votes.clone();
        let filter = doc! { "election_id": election_id };
        let oldest_first = FindOptions::builder().sort(doc! { "cast_at": 1 }).build();
        async move {
            votes
                .find(filter, oldest_first)
                .await?
                .try_collect()
                .await
        }
    })
    .await?;

    let audit_logs: Vec<AuditLog> = retry::execute(|| {
        let logs = logs.clone();
        let filter = doc! { "entity_type": "election", "entity_id": election_id };
        let newest_first = FindOptions::builder()
            .sort(doc! { "timestamp": -1 })
            .build();
        async move { logs.find(filter, newest_first).await?.try_collect().await }
    })
    .await?;

    Ok(Json(AdminElectionResults {
        election: election.into(),
        votes: election_votes.into_iter().map(Into::into).collect(),
        audit_logs: audit_logs.into_iter().map(Into::into).collect(),
    }))
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use rocket::http::{ContentType, Status};
    use rocket::local::asynchronous::Client;
    use rocket::serde::json::serde_json::{self, json};

    use crate::model::db::election::{ElectionCore, NewElection};
    use crate::testing::{bearer, login_admin, register_voter};

    use super::*;

    #[backend_test]
    async fn results_gated_until_end(
        client: Client,
        elections: Coll<NewElection>,
        full_elections: Coll<Election>,
    ) {
        let election_id = insert_election(&elections, ElectionCore::active_example()).await;
        let voter = register_voter(&client).await;
        cast(&client, &voter.token, election_id).await;

        // Still running: sealed, and the refusal carries the end date.
        let response = client
            .get(uri!("/api", election_results(election_id)))
            .dispatch()
            .await;
        assert_eq!(Status::Forbidden, response.status());
        let raw_response = response.into_string().await.unwrap();
        assert!(raw_response.contains("endDate"));

        // Move the end date into the past.
        let mut election = full_elections
            .find_one(election_id.as_doc(), None)
            .await
            .unwrap()
            .unwrap();
        election.election.end_date = chrono::Utc::now() - Duration::seconds(1);
        let result = full_elections
            .replace_one(election_id.as_doc(), &election, None)
            .await
            .unwrap();
        assert_eq!(result.modified_count, 1);

        // Now the results open up.
        let response = client
            .get(uri!("/api", election_results(election_id)))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let results: ElectionResults =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(results.election.id, election_id);
        assert_eq!(results.vote_count, 1);
    }

    #[backend_test]
    async fn results_count_accepted_votes_only(
        client: Client,
        elections: Coll<NewElection>,
        full_elections: Coll<Election>,
    ) {
        let election_id = insert_election(&elections, ElectionCore::active_example()).await;
        let voter = register_voter(&client).await;

        // One accepted vote, one rejected duplicate.
        cast(&client, &voter.token, election_id).await;
        let response = client
            .post("/api/votes")
            .header(ContentType::JSON)
            .header(bearer(&voter.token))
            .body(
                json!({
                    "electionId": election_id.to_string(),
                    "encryptedChoice": "again",
                })
                .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(Status::Conflict, response.status());

        let mut election = full_elections
            .find_one(election_id.as_doc(), None)
            .await
            .unwrap()
            .unwrap();
        election.election.end_date = chrono::Utc::now() - Duration::seconds(1);
        full_elections
            .replace_one(election_id.as_doc(), &election, None)
            .await
            .unwrap();

        let response = client
            .get(uri!("/api", election_results(election_id)))
            .dispatch()
            .await;
        let results: ElectionResults =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(results.vote_count, 1);
    }

    #[backend_test]
    async fn results_unknown_election(client: Client) {
        let response = client
            .get(uri!("/api", election_results(Id::new())))
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[backend_test]
    async fn admin_results(client: Client, elections: Coll<NewElection>) {
        let election_id = insert_election(&elections, ElectionCore::active_example()).await;
        let voter = register_voter(&client).await;
        cast(&client, &voter.token, election_id).await;

        let admin = login_admin(&client).await;

        // Available while the election is still running.
        let response = client
            .get(uri!("/api", admin_election_results(election_id)))
            .header(bearer(&admin.token))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let raw_response = response.into_string().await.unwrap();
        let results: AdminElectionResults = serde_json::from_str(&raw_response).unwrap();

        assert_eq!(results.votes.len(), 1);
        assert_eq!(results.votes[0].encrypted_choice, "sealed-choice");
        assert!(results
            .audit_logs
            .iter()
            .any(|log| log.entity_type == "election"));
        // Even admins never see voter hashes.
        assert!(!raw_response.contains("voterHash"));
        assert!(!raw_response.contains("voter_hash"));
    }

    #[backend_test]
    async fn admin_results_require_admin(client: Client, elections: Coll<NewElection>) {
        let election_id = insert_election(&elections, ElectionCore::active_example()).await;
        let voter = register_voter(&client).await;

        let response = client
            .get(uri!("/api", admin_election_results(election_id)))
            .header(bearer(&voter.token))
            .dispatch()
            .await;
        assert_eq!(Status::Forbidden, response.status());

        let response = client
            .get(uri!("/api", admin_election_results(election_id)))
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());
    }

    async fn insert_election(elections: &Coll<NewElection>, election: NewElection) -> Id {
        elections
            .insert_one(election, None)
            .await
            .unwrap()
            .inserted_id
            .as_object_id()
            .unwrap()
            .into()
    }

    async fn cast(client: &Client, token: &str, election_id: Id) {
        let response = client
            .post("/api/votes")
            .header(ContentType::JSON)
            .header(bearer(token))
            .body(
                json!({
                    "electionId": election_id.to_string(),
                    "encryptedChoice": "sealed-choice",
                })
                .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(Status::Created, response.status());
    }
}
