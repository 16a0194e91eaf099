//! Bounded exponential-backoff retry for store operations.

use std::future::Future;
use std::time::Duration;

use mongodb::error::{Error as DbError, ErrorKind, Result as DbResult};
use rocket::tokio::time::sleep;

/// Maximum number of retries after the initial attempt.
pub const MAX_RETRIES: u32 = 3;

/// Backoff before the first retry; doubles on each subsequent one.
pub const INITIAL_BACKOFF: Duration = Duration::from_millis(300);

/// Error label attached by the server to retryable transaction failures.
const TRANSIENT_TRANSACTION_ERROR: &str = "TransientTransactionError";

/// Server code for a write conflict between concurrent operations.
const WRITE_CONFLICT: i32 = 112;

/// Execute `op`, retrying up to [`MAX_RETRIES`] times with exponential
/// backoff whenever it fails with a transient error. Non-transient failures
/// (constraint violations, malformed queries) propagate immediately and
/// unchanged.
///
/// The operation must be side-effect free on failure, since it will be run
/// again from scratch. Statements inside an open transaction must not go
/// through here; the driver's transaction machinery owns those.
pub async fn execute<T, F, Fut>(op: F) -> DbResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = DbResult<T>>,
{
    let mut backoff = INITIAL_BACKOFF;
    let mut retries = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if is_transient(&err) && retries < MAX_RETRIES => {
                retries += 1;
                warn!("Database operation failed, retrying ({retries}/{MAX_RETRIES}): {err}");
                sleep(backoff).await;
                backoff *= 2;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Classify an error as safe to retry: connection/IO failures, failure to
/// select a server, and write conflicts. Everything else propagates.
fn is_transient(err: &DbError) -> bool {
    if err.contains_label(TRANSIENT_TRANSACTION_ERROR) {
        return true;
    }
    match *err.kind {
        ErrorKind::Io(_) => true,
        ErrorKind::ServerSelection { .. } => true,
        ErrorKind::Command(ref command) => command.code == WRITE_CONFLICT,
        _ => false,
    }
}
