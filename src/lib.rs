#[macro_use]
extern crate rocket;

#[macro_use]
extern crate log;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;

#[cfg(test)]
pub(crate) mod testing;

use config::{ConfigFairing, DatabaseFairing};
use logging::LoggerFairing;

/// Assemble the server: configuration, database connection, request logging,
/// and the API routes.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .attach(ConfigFairing)
        .attach(DatabaseFairing)
        .attach(LoggerFairing)
        .mount("/api", api::routes())
}

/// Connect to the database server used for tests.
#[cfg(test)]
pub(crate) async fn db_client() -> mongodb::Client {
    let db_uri = rocket::build()
        .figment()
        .extract_inner::<String>("db_uri")
        .expect("`db_uri` not set");
    mongodb::Client::with_uri_str(&db_uri)
        .await
        .expect("Could not connect to the test database server")
}

/// Generate a random database name, avoiding collisions between
/// concurrently-running tests.
#[cfg(test)]
pub(crate) fn database() -> String {
    let random: u32 = rand::random();
    format!("test{random}")
}

/// Build a rocket instance against an existing database connection.
/// Used by the `#[backend_test]` harness, which owns the database lifecycle.
#[cfg(test)]
pub(crate) async fn rocket_for_db(client: mongodb::Client, db_name: &str) -> Rocket<Build> {
    use model::db::user::ensure_admin_exists;
    use model::mongodb::{ensure_indexes_exist, Coll};

    let rocket = rocket::build();
    let config = rocket
        .figment()
        .extract::<config::Config>()
        .expect("Invalid test config");
    let db = client.database(db_name);

    ensure_indexes_exist(&db)
        .await
        .expect("Failed to create test database indexes");
    ensure_admin_exists(&Coll::from_db(&db), &config)
        .await
        .expect("Failed to seed the test admin account");

    rocket
        .mount("/api", api::routes())
        .manage(config)
        .manage(client)
        .manage(db)
}
