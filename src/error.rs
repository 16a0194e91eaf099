use std::io::Cursor;

use chrono::{DateTime, Utc};
use mongodb::error::Error as DbError;
use rocket::{
    http::{ContentType, Status},
    response::{self, Responder, Response},
    serde::json::{json, Value},
    Request,
};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error(transparent)]
    Argon2(#[from] argon2::Error),
    #[error("{1}")]
    Status(Status, String),
    #[error("Election results are not available until the election has ended")]
    ResultsNotAvailable { end_date: DateTime<Utc> },
}

impl Error {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::Status(Status::BadRequest, message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Status(Status::Unauthorized, message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Status(Status::Forbidden, message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::Status(Status::NotFound, message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Status(Status::Conflict, message.into())
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    /// Render every error as its HTTP status with a JSON `{"error": ...}` body.
    /// Internal details never reach the client.
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'o> {
        let (status, body): (Status, Value) = match &self {
            Self::Db(err) => {
                error!("Database error: {err}");
                (
                    Status::InternalServerError,
                    json!({ "error": "Internal server error" }),
                )
            }
            Self::Argon2(err) => {
                error!("Password hashing error: {err}");
                (
                    Status::InternalServerError,
                    json!({ "error": "Internal server error" }),
                )
            }
            Self::Jwt(_) => (Status::Unauthorized, json!({ "error": "Invalid token" })),
            Self::Status(status, message) => (*status, json!({ "error": message })),
            Self::ResultsNotAvailable { end_date } => (
                Status::Forbidden,
                json!({
                    "error": self.to_string(),
                    "endDate": end_date,
                }),
            ),
        };

        if status.class() == rocket::http::StatusClass::ClientError {
            warn!("{status}: {self}");
        }

        let body = body.to_string();
        Response::build()
            .status(status)
            .header(ContentType::JSON)
            .sized_body(body.len(), Cursor::new(body))
            .ok()
    }
}
