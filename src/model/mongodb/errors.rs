//! For some reason, the mongodb crate doesn't provide error code constants.
//! This module fills in the gaps.

use mongodb::error::{Error as DbError, ErrorKind, WriteFailure};

pub const DUPLICATE_KEY: i32 = 11000;

/// If the given error is a duplicate key write error, return its message.
/// The message names the index whose constraint was violated.
pub fn duplicate_key_message(err: &DbError) -> Option<&str> {
    if let ErrorKind::Write(WriteFailure::WriteError(ref e)) = *err.kind {
        if e.code == DUPLICATE_KEY {
            return Some(&e.message);
        }
    }
    None
}

/// Return true if the given error is a duplicate key write error.
pub fn is_duplicate_key_error(err: &DbError) -> bool {
    duplicate_key_message(err).is_some()
}

/// Return true if the given error is a duplicate key write error against the
/// named index.
pub fn violates_index(err: &DbError, index_name: &str) -> bool {
    duplicate_key_message(err).map_or(false, |msg| msg.contains(index_name))
}
