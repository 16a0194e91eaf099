mod bson;
mod collection;
mod errors;
pub mod retry;

pub use bson::{serde_id_string, Id};
pub use collection::{
    ensure_indexes_exist, Coll, MongoCollection, UNIQUE_EMAIL_INDEX, UNIQUE_OPTION_ORDER_INDEX,
    UNIQUE_VERIFICATION_CODE_INDEX, UNIQUE_VOTER_ELECTION_INDEX,
};
pub use errors::{duplicate_key_message, is_duplicate_key_error, violates_index, DUPLICATE_KEY};
