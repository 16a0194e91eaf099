use chrono::Duration;
use mongodb::Client as MongoClient;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::model::{
    db::user::ensure_admin_exists,
    mongodb::{ensure_indexes_exist, Coll},
};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    auth_ttl: u32,
    // secrets
    jwt_secret: String,
    voter_hash_secret: String,
    default_admin_password: String,
}

impl Config {
    /// Valid lifetime of bearer tokens in seconds.
    pub fn auth_ttl(&self) -> Duration {
        Duration::seconds(self.auth_ttl.into())
    }

    /// Secret key used to sign JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }

    /// Secret key for the voter-hash HMAC.
    pub fn voter_hash_secret(&self) -> &[u8] {
        self.voter_hash_secret.as_bytes()
    }

    /// Password for the admin account seeded at first launch.
    pub fn default_admin_password(&self) -> &str {
        &self.default_admin_password
    }
}

/// A fairing that loads the application config and puts it in managed state.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        // Manage the state.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Configuration for the database.
#[derive(Deserialize)]
struct DbConfig {
    // secrets
    db_uri: String,
}

/// A fairing that loads the database config, connects, performs any setup
/// necessary, and places both a `Client` and a `Database` into managed state.
pub struct DatabaseFairing;

#[rocket::async_trait]
impl Fairing for DatabaseFairing {
    fn info(&self) -> Info {
        Info {
            name: "MongoDB",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let db_config = match rocket.figment().extract::<DbConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load database config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        info!("Loaded database config, connecting...");

        // Construct the connection.
        let client = match MongoClient::with_uri_str(db_config.db_uri).await {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to connect to database: {e}");
                return Err(rocket);
            }
        };
        let db = client.database(DATABASE_NAME);

        // Ensure the required indexes exist; the vote-integrity guarantees
        // depend on the unique ones.
        if let Err(e) = ensure_indexes_exist(&db).await {
            error!("Failed to set up database indexes: {e}");
            return Err(rocket);
        }

        // Ensure there is at least one admin account.
        if let Err(e) = ensure_admin_exists(&Coll::from_db(&db), &config).await {
            error!("Failed to seed the admin account: {e}");
            return Err(rocket);
        }
        info!("...database connection online!");

        // Manage the state.
        rocket = rocket.manage(client).manage(db);
        Ok(rocket)
    }
}

/// Name of the production database.
const DATABASE_NAME: &str = "securevote";
