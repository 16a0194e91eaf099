use mongodb::bson::doc;
use rocket::futures::TryStreamExt;

use crate::error::Result;
use crate::model::api::election::BallotDescription;
use crate::model::db::ballot::{Ballot, BallotOption};
use crate::model::mongodb::{retry, Coll, Id};

/// Fetch all ballots of an election together with their ordered options.
pub async fn ballots_for_election(
    ballots: &Coll<Ballot>,
    options: &Coll<BallotOption>,
    election_id: Id,
) -> Result<Vec<BallotDescription>> {
    let election_ballots: Vec<Ballot> = retry::execute(|| {
        let ballots = ballots.clone();
        async move {
            ballots
                .find(doc! { "election_id": election_id }, None)
                .await?
                .try_collect()
                .await
        }
    })
    .await?;

    let mut descriptions = Vec::with_capacity(election_ballots.len());
    for ballot in election_ballots {
        let ballot_options: Vec<BallotOption> = retry::execute(|| {
            let options = options.clone();
            let ballot_id = ballot.id;
            async move {
                options
                    .find(doc! { "ballot_id": ballot_id }, None)
                    .await?
                    .try_collect()
                    .await
            }
        })
        .await?;
        descriptions.push(BallotDescription::assemble(ballot, ballot_options));
    }

    Ok(descriptions)
}
