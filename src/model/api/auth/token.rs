use std::marker::PhantomData;

use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation};
use mongodb::Database;
use rocket::{
    http::Status,
    request::{FromRequest, Outcome},
    Request, State,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::Error;
use crate::model::db::user::User;
use crate::model::mongodb::{serde_id_string, Coll, Id};

use super::user::{Rights, Role};

/// Name of the header carrying the bearer token.
pub const AUTH_HEADER: &str = "Authorization";

const BEARER_PREFIX: &str = "Bearer ";

/// An authentication token representing a specific user with specific rights.
///
/// The type parameter is the access level a route requires; decoding checks
/// the token's actual rights against it.
#[derive(Serialize, Deserialize)]
pub struct AuthToken<U> {
    #[serde(rename = "sub", with = "serde_id_string")]
    pub id: Id,
    #[serde(rename = "rgt")]
    pub rights: Rights,
    #[serde(skip)]
    phantom: PhantomData<U>,
}

impl<U> AuthToken<U> {
    /// Create a token for the given user ID carrying the given rights.
    pub fn new(id: Id, rights: Rights) -> Self {
        Self {
            id,
            rights,
            phantom: PhantomData,
        }
    }

    /// Does this token permit the given rights?
    pub fn permits(&self, target: Rights) -> bool {
        self.rights.permits(target)
    }

    /// Serialize this token into a signed bearer string.
    pub fn encode(self, config: &Config) -> String {
        let claims = Claims {
            token: self,
            expire_at: Utc::now() + config.auth_ttl(),
        };

        jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )
        .expect("JWT encoding is infallible with default settings")
    }

    /// Deserialize and verify a bearer string.
    pub fn decode(token: &str, config: &Config) -> Result<Self, Error> {
        let data: TokenData<Claims<U>> = jsonwebtoken::decode(
            token,
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )?;
        Ok(data.claims.token)
    }
}

/// Token claims: the token itself plus an expiry datetime.
#[derive(Serialize, Deserialize)]
struct Claims<U> {
    #[serde(flatten, bound = "")]
    token: AuthToken<U>,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

#[rocket::async_trait]
impl<'r, U> FromRequest<'r> for AuthToken<U>
where
    U: Role + Send,
{
    type Error = Error;

    /// Get an [`AuthToken`] from the `Authorization` header and verify that
    /// it grants the rights this route requires: a missing or undecodable
    /// token fails with 401, insufficient rights with 403, and a token for a
    /// user that no longer exists with 401.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        // Unwrap is safe as `Config` is always managed.
        let config = req.guard::<&State<Config>>().await.unwrap();

        let header = match req.headers().get_one(AUTH_HEADER) {
            Some(header) => header,
            None => {
                return Outcome::Failure((
                    Status::Unauthorized,
                    Error::unauthorized("No token provided"),
                ))
            }
        };
        let bearer = match header.strip_prefix(BEARER_PREFIX) {
            Some(bearer) => bearer,
            None => {
                return Outcome::Failure((
                    Status::Unauthorized,
                    Error::unauthorized("Malformed Authorization header"),
                ))
            }
        };

        let token = match Self::decode(bearer, config) {
            Ok(token) => token,
            Err(err) => return Outcome::Failure((Status::Unauthorized, err)),
        };

        if !token.permits(U::RIGHTS) {
            return Outcome::Failure((
                Status::Forbidden,
                Error::forbidden("Requires admin privileges"),
            ));
        }

        // Check the user actually still exists.
        let db = req.guard::<&State<Database>>().await.unwrap();
        match Coll::<User>::from_db(db)
            .find_one(token.id.as_doc(), None)
            .await
        {
            Ok(Some(_)) => Outcome::Success(token),
            Ok(None) => Outcome::Failure((
                Status::Unauthorized,
                Error::unauthorized("No user matches this token"),
            )),
            Err(err) => Outcome::Failure((Status::InternalServerError, err.into())),
        }
    }
}
