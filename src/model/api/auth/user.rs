use std::fmt::{self, Display, Formatter};

use mongodb::bson::{to_bson, Bson};
use serde::{Deserialize, Serialize};

/// Privilege levels. Admin rights subsume voter rights.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rights {
    Voter,
    Admin,
}

impl Rights {
    /// Does a holder of these rights satisfy `target`?
    pub fn permits(self, target: Rights) -> bool {
        self >= target
    }
}

impl Display for Rights {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "{}",
            match self {
                Self::Voter => "voter",
                Self::Admin => "admin",
            }
        )
    }
}

impl From<Rights> for Bson {
    fn from(rights: Rights) -> Self {
        to_bson(&rights).expect("Serialisation is infallible")
    }
}

/// A required access level, used as a type parameter on token guards.
pub trait Role {
    const RIGHTS: Rights;
}

/// Marker for routes any signed-in user may call.
pub struct Voter;

/// Marker for admin-only routes.
pub struct Admin;

impl Role for Voter {
    const RIGHTS: Rights = Rights::Voter;
}

impl Role for Admin {
    const RIGHTS: Rights = Rights::Admin;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_subsumes_voter() {
        assert!(Rights::Admin.permits(Rights::Voter));
        assert!(Rights::Admin.permits(Rights::Admin));
        assert!(Rights::Voter.permits(Rights::Voter));
        assert!(!Rights::Voter.permits(Rights::Admin));
    }
}
