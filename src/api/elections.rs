use std::net::IpAddr;

use mongodb::{
    bson::{doc, Bson, DateTime as BsonDateTime, Document},
    options::FindOptions,
    Client,
};
use rocket::{futures::TryStreamExt, http::Status, serde::json::Json, Route, State};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            auth::{Admin, AuthToken},
            election::{
                options_for_ballot, BallotDescription, BallotSpec, ElectionDescription,
                ElectionSpec, ElectionSummary, ElectionUpdate,
            },
        },
        db::{
            audit::{self, AuditAction, NewAuditLog},
            ballot::{Ballot, BallotOption, NewBallot, NewBallotOption},
            election::{Election, ElectionState, NewElection},
            user::User,
            vote::Vote,
        },
        mongodb::{retry, Coll, Id},
    },
};

use super::common::ballots_for_election;

pub fn routes() -> Vec<Route> {
    routes![
        list_elections,
        get_election,
        create_election,
        update_election,
        create_ballot,
        delete_election,
    ]
}

#[get("/elections?<active>&<status>")]
async fn list_elections(
    active: Option<bool>,
    status: Option<String>,
    elections: Coll<Election>,
) -> Result<Json<Vec<ElectionSummary>>> {
    let filter = if active.unwrap_or(false) {
        let now = BsonDateTime::now();
        doc! {
            "status": ElectionState::Active,
            "start_date": { "$lte": now },
            "end_date": { "$gt": now },
        }
    } else if let Some(status) = status {
        let state: ElectionState = status
            .parse()
            .map_err(|_| Error::bad_request(format!("Unknown election status '{status}'")))?;
        doc! { "status": state }
    } else {
        doc! {}
    };

    let newest_first = FindOptions::builder()
        .sort(doc! { "start_date": -1 })
        .build();
    let elections: Vec<Election> = retry::execute(|| {
        let elections = elections.clone();
        let filter = filter.clone();
        let options = newest_first.clone();
        async move { elections.find(filter, options).await?.try_collect().await }
    })
    .await?;

    Ok(Json(elections.into_iter().map(Into::into).collect()))
}

#[get("/elections/<election_id>")]
async fn get_election(
    election_id: Id,
    elections: Coll<Election>,
    ballots: Coll<Ballot>,
    options: Coll<BallotOption>,
    users: Coll<User>,
) -> Result<Json<ElectionDescription>> {
    let election = retry::execute(|| {
        let elections = elections.clone();
        let filter = election_id.as_doc();
        async move { elections.find_one(filter, None).await }
    })
    .await?
    .ok_or_else(|| Error::not_found(format!("Election {election_id}")))?;

    let creator = match election.created_by {
        Some(creator_id) => {
            retry::execute(|| {
                let users = users.clone();
                let filter = creator_id.as_doc();
                async move { users.find_one(filter, None).await }
            })
            .await?
        }
        None => None,
    };

    let descriptions = ballots_for_election(&ballots, &options, election_id).await?;

    Ok(Json(ElectionDescription::assemble(
        election,
        creator,
        descriptions,
    )))
}

#[post("/elections", data = "<spec>", format = "json")]
async fn create_election(
    token: AuthToken<Admin>,
    spec: Json<ElectionSpec>,
    new_elections: Coll<NewElection>,
    elections: Coll<Election>,
    logs: Coll<NewAuditLog>,
    ip: Option<IpAddr>,
) -> Result<(Status, Json<ElectionSummary>)> {
    let spec = spec.0;
    if spec.title.is_empty() {
        return Err(Error::bad_request("Missing required field: title"));
    }
    if spec.end_date <= spec.start_date {
        return Err(Error::bad_request("Election must end after it starts"));
    }

    let election = spec.into_election(Some(token.id));
    let new_id: Id = retry::execute(|| {
        let new_elections = new_elections.clone();
        let election = election.clone();
        async move { new_elections.insert_one(election, None).await }
    })
    .await?
    .inserted_id
    .as_object_id()
    .unwrap() // Valid because the ID comes directly from the DB.
    .into();

    // Retrieve the stored form, so the response carries exactly what later
    // reads will return.
    let election = retry::execute(|| {
        let elections = elections.clone();
        let filter = new_id.as_doc();
        async move { elections.find_one(filter, None).await }
    })
    .await?
    .unwrap(); // Presence is guaranteed; the insert just succeeded.

    audit::record(
        &logs,
        NewAuditLog::new(
            AuditAction::ElectionCreated,
            "election",
            Some(new_id),
            ip,
            None,
        ),
    )
    .await;

    Ok((Status::Created, Json(election.into())))
}

#[put("/elections/<election_id>", data = "<update>", format = "json")]
async fn update_election(
    _token: AuthToken<Admin>,
    election_id: Id,
    update: Json<ElectionUpdate>,
    elections: Coll<Election>,
) -> Result<Json<ElectionSummary>> {
    // Read, patch, write back; absent fields keep their stored values.
    let mut election = retry::execute(|| {
        let elections = elections.clone();
        let filter = election_id.as_doc();
        async move { elections.find_one(filter, None).await }
    })
    .await?
    .ok_or_else(|| Error::not_found(format!("Election {election_id}")))?;

    update.0.apply(&mut election.election);
    if election.end_date <= election.start_date {
        return Err(Error::bad_request("Election must end after it starts"));
    }

    retry::execute(|| {
        let elections = elections.clone();
        let filter = election_id.as_doc();
        let election = election.clone();
        async move { elections.replace_one(filter, election, None).await }
    })
    .await?;

    Ok(Json(election.into()))
}

#[post("/elections/<election_id>/ballots", data = "<spec>", format = "json")]
async fn create_ballot(
    _token: AuthToken<Admin>,
    election_id: Id,
    spec: Json<BallotSpec>,
    elections: Coll<Election>,
    new_ballots: Coll<NewBallot>,
    new_options: Coll<NewBallotOption>,
    ballots: Coll<Ballot>,
    options: Coll<BallotOption>,
    db_client: &State<Client>,
) -> Result<(Status, Json<BallotDescription>)> {
    let spec = spec.0;
    if spec.title.is_empty() || spec.options.is_empty() {
        return Err(Error::bad_request(
            "Missing required fields: title, options",
        ));
    }

    retry::execute(|| {
        let elections = elections.clone();
        let filter = election_id.as_doc();
        async move { elections.find_one(filter, None).await }
    })
    .await?
    .ok_or_else(|| Error::not_found(format!("Election {election_id}")))?;

    // Insert the ballot and all of its options, or nothing.
    let (ballot, option_texts) = spec.into_ballot(election_id);
    let ballot_id: Id = {
        let mut session = db_client.start_session(None).await?;
        session.start_transaction(None).await?;

        let ballot_id: Id = new_ballots
            .insert_one_with_session(&ballot, None, &mut session)
            .await?
            .inserted_id
            .as_object_id()
            .unwrap() // Valid because the ID comes directly from the DB.
            .into();

        let ballot_options = options_for_ballot(ballot_id, option_texts);
        new_options
            .insert_many_with_session(&ballot_options, None, &mut session)
            .await?;

        session.commit_transaction().await?;
        ballot_id
    };

    // Read back the stored ballot with its options.
    let ballot = retry::execute(|| {
        let ballots = ballots.clone();
        let filter = ballot_id.as_doc();
        async move { ballots.find_one(filter, None).await }
    })
    .await?
    .ok_or_else(|| Error::not_found(format!("Ballot {ballot_id}")))?;
    let ballot_options: Vec<BallotOption> = retry::execute(|| {
        let options = options.clone();
        let filter = doc! { "ballot_id": ballot_id };
        async move { options.find(filter, None).await?.try_collect().await }
    })
    .await?;

    Ok((
        Status::Created,
        Json(BallotDescription::assemble(ballot, ballot_options)),
    ))
}

#[delete("/elections/<election_id>")]
#[allow(clippy::too_many_arguments)]
async fn delete_election(
    _token: AuthToken<Admin>,
    election_id: Id,
    elections: Coll<Election>,
    ballots: Coll<Ballot>,
    options: Coll<BallotOption>,
    votes: Coll<Vote>,
    logs: Coll<NewAuditLog>,
    ip: Option<IpAddr>,
    db_client: &State<Client>,
) -> Result<Status> {
    retry::execute(|| {
        let elections = elections.clone();
        let filter = election_id.as_doc();
        async move { elections.find_one(filter, None).await }
    })
    .await?
    .ok_or_else(|| Error::not_found(format!("Election {election_id}")))?;

    // Atomically delete the election and everything hanging off it:
    // ballots, their options, and all votes.
    {
        let mut session = db_client.start_session(None).await?;
        session.start_transaction(None).await?;

        let result = elections
            .delete_one_with_session(election_id.as_doc(), None, &mut session)
            .await?;
        assert_eq!(result.deleted_count, 1);

        let by_election = doc! { "election_id": election_id };

        // Collect the ballot IDs so their options can go too.
        let mut ballot_ids: Vec<Bson> = Vec::new();
        let mut cursor = ballots
            .find_with_session(by_election.clone(), None, &mut session)
            .await?;
        while let Some(ballot) = cursor.next(&mut session).await {
            ballot_ids.push(ballot?.id.into());
        }
        if !ballot_ids.is_empty() {
            let by_ballot: Document = doc! { "ballot_id": { "$in": ballot_ids } };
            options
                .delete_many_with_session(by_ballot, None, &mut session)
                .await?;
        }

        ballots
            .delete_many_with_session(by_election.clone(), None, &mut session)
            .await?;
        votes
            .delete_many_with_session(by_election, None, &mut session)
            .await?;

        session.commit_transaction().await?;
    }

    audit::record(
        &logs,
        NewAuditLog::new(
            AuditAction::ElectionDeleted,
            "election",
            Some(election_id),
            ip,
            None,
        ),
    )
    .await;

    Ok(Status::NoContent)
}
