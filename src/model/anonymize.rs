//! Voter pseudonymization and public vote verification codes.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use data_encoding::{HEXLOWER, HEXUPPER};
use hmac::{Hmac, Mac};
use mongodb::bson::Bson;
use rand::Rng;
use rocket::{
    http::{
        impl_from_uri_param_identity,
        uri::fmt::{Path, UriDisplay},
    },
    request::FromParam,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::Config;
use crate::model::mongodb::Id;

type HmacSha256 = Hmac<Sha256>;

/// Number of characters in a verification code.
pub const CODE_LENGTH: usize = 10;

/// A deterministic pseudonym binding a voter to a single election.
///
/// Derived as a keyed HMAC over the user and election IDs: a stored vote
/// never references the user, the same (user, election) pair always maps to
/// the same hash, and hashes from different elections cannot be linked back
/// to a common voter without the key and the original user ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoterHash(String);

impl VoterHash {
    /// Derive the pseudonym for the given user in the given election.
    pub fn derive(user_id: Id, election_id: Id, config: &Config) -> Self {
        let mut mac = HmacSha256::new_from_slice(config.voter_hash_secret())
            .expect("HMAC can take key of any size");
        mac.update(user_id.to_string().as_bytes());
        mac.update(b":");
        mac.update(election_id.to_string().as_bytes());
        Self(HEXLOWER.encode(&mac.finalize().into_bytes()))
    }
}

impl Display for VoterHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<VoterHash> for Bson {
    fn from(hash: VoterHash) -> Self {
        Self::String(hash.0)
    }
}

/// A short public token a voter can later use to confirm that their vote was
/// recorded, without revealing their identity or choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VerificationCode(String);

impl VerificationCode {
    /// Generate the code for a vote being cast at the given instant.
    pub fn generate(voter_hash: &VoterHash, cast_at: DateTime<Utc>) -> Self {
        Self::digest(voter_hash, cast_at, None)
    }

    /// Generate a replacement code after a collision, mixing in fresh entropy.
    pub fn regenerate(voter_hash: &VoterHash, cast_at: DateTime<Utc>) -> Self {
        let salt: [u8; 8] = rand::thread_rng().gen();
        Self::digest(voter_hash, cast_at, Some(&salt))
    }

    fn digest(voter_hash: &VoterHash, cast_at: DateTime<Utc>, salt: Option<&[u8]>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(voter_hash.0.as_bytes());
        hasher.update(b":");
        hasher.update(cast_at.timestamp_millis().to_le_bytes());
        if let Some(salt) = salt {
            hasher.update(salt);
        }
        let encoded = HEXUPPER.encode(&hasher.finalize());
        Self(encoded[..CODE_LENGTH].to_string())
    }
}

impl Display for VerificationCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for VerificationCode {
    type Err = ParseError;

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        if string.len() != CODE_LENGTH {
            return Err(ParseError::InvalidLength(string.len()));
        }
        if let Some(bad) = string
            .chars()
            .find(|c| !matches!(c, '0'..='9' | 'A'..='F'))
        {
            return Err(ParseError::InvalidChar(bad));
        }
        Ok(Self(string.to_string()))
    }
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("verification code must contain exactly {CODE_LENGTH} characters, got {0}")]
    InvalidLength(usize),
    #[error("verification code must contain only uppercase hex digits, found '{0}'")]
    InvalidChar(char),
}

impl TryFrom<String> for VerificationCode {
    type Error = ParseError;

    fn try_from(string: String) -> Result<Self, Self::Error> {
        string.parse()
    }
}

impl From<VerificationCode> for String {
    fn from(code: VerificationCode) -> Self {
        code.0
    }
}

impl From<VerificationCode> for Bson {
    fn from(code: VerificationCode) -> Self {
        Self::String(code.0)
    }
}

impl<'a> FromParam<'a> for VerificationCode {
    type Error = ParseError;

    fn from_param(param: &'a str) -> Result<Self, Self::Error> {
        param.parse()
    }
}

impl UriDisplay<Path> for VerificationCode {
    fn fmt(&self, formatter: &mut rocket::http::uri::fmt::Formatter<'_, Path>) -> fmt::Result {
        formatter.write_value(&self.0)
    }
}

impl_from_uri_param_identity!([Path] VerificationCode);
