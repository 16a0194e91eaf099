//! API-compatible types: the request and response shapes of the HTTP
//! surface, serialised in a JSON-friendly way (hex-string IDs, RFC 3339
//! datetimes).

pub mod auth;
pub mod election;
pub mod results;
pub mod vote;
