use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use mongodb::bson::{doc, DateTime as BsonDateTime};
use mongodb::error::Error as DbError;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::model::api::auth::Rights;
use crate::model::mongodb::{Coll, Id};

/// Email of the admin account seeded at first launch.
pub const DEFAULT_ADMIN_EMAIL: &str = "admin@securevote.example";

/// Core user data, as stored in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCore {
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub organization: Option<String>,
    pub role: Rights,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_login: Option<BsonDateTime>,
}

impl UserCore {
    /// Create a new user record. The password must already be hashed.
    pub fn new(
        email: String,
        password_hash: String,
        full_name: String,
        organization: Option<String>,
        role: Rights,
    ) -> Self {
        Self {
            email,
            password_hash,
            full_name,
            organization,
            role,
            created_at: Utc::now(),
            last_login: None,
        }
    }

    /// Check whether the given password is correct.
    pub fn verify_password<T: AsRef<[u8]>>(&self, password: T) -> bool {
        // Hashes are only ever produced by `hash_password`, so they are
        // always well-formed.
        argon2::verify_encoded(&self.password_hash, password.as_ref()).unwrap_or(false)
    }
}

/// A user without an ID.
pub type NewUser = UserCore;

/// A user from the database, with their unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub user: UserCore,
}

impl Deref for User {
    type Target = UserCore;

    fn deref(&self) -> &Self::Target {
        &self.user
    }
}

impl DerefMut for User {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.user
    }
}

/// Hash a password for storage.
pub fn hash_password(password: &str) -> String {
    // 16 bytes is the recommended salt size for argon2.
    let mut salt = [0_u8; 16];
    rand::thread_rng().fill(&mut salt);
    argon2::hash_encoded(password.as_bytes(), &salt, &argon2::Config::default())
        .expect("The default argon2 config is valid")
}

/// Ensure there is at least one admin account, seeding the default one if
/// not. Public registration only ever creates voters.
///
/// This operation is idempotent.
pub async fn ensure_admin_exists(users: &Coll<User>, config: &Config) -> Result<(), DbError> {
    let any_admin = doc! { "role": Rights::Admin };
    if users.find_one(any_admin, None).await?.is_none() {
        let admin = NewUser::new(
            DEFAULT_ADMIN_EMAIL.to_string(),
            hash_password(config.default_admin_password()),
            "Election Administrator".to_string(),
            None,
            Rights::Admin,
        );
        users
            .clone_with_type::<NewUser>()
            .insert_one(admin, None)
            .await?;
        info!("Created default admin account {DEFAULT_ADMIN_EMAIL}");
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_round_trip() {
        let user = UserCore::example();
        assert!(user.verify_password("Str0ng!pass"));
        assert!(!user.verify_password("Str0ng!pass "));
        assert!(!user.verify_password(""));
    }
}
