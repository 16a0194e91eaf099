use std::net::IpAddr;
use std::ops::Deref;

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use mongodb::bson::Document;
use serde::{Deserialize, Serialize};

use crate::model::mongodb::{Coll, Id};

/// Actions recorded in the audit log.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    UserRegistered,
    VoteCast,
    ElectionCreated,
    ElectionDeleted,
}

/// Core audit log data: an append-only record of an action against an
/// entity, without any voter identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogCore {
    pub action: AuditAction,
    pub entity_type: String,
    pub entity_id: Option<Id>,
    pub ip_address: Option<String>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub timestamp: DateTime<Utc>,
    pub details: Option<Document>,
}

impl AuditLogCore {
    pub fn new(
        action: AuditAction,
        entity_type: impl Into<String>,
        entity_id: Option<Id>,
        ip: Option<IpAddr>,
        details: Option<Document>,
    ) -> Self {
        Self {
            action,
            entity_type: entity_type.into(),
            entity_id,
            ip_address: ip.map(|ip| ip.to_string()),
            timestamp: Utc::now(),
            details,
        }
    }
}

/// An audit log entry without an ID.
pub type NewAuditLog = AuditLogCore;

/// An audit log entry from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub entry: AuditLogCore,
}

impl Deref for AuditLog {
    type Target = AuditLogCore;

    fn deref(&self) -> &Self::Target {
        &self.entry
    }
}

/// Append an audit entry. Delivery is at-most-once: a failed write is logged
/// and never fails the request that triggered it.
pub async fn record(logs: &Coll<NewAuditLog>, entry: NewAuditLog) {
    let action = entry.action;
    if let Err(err) = logs.insert_one(&entry, None).await {
        warn!("Failed to write audit log entry for {action:?}: {err}");
    }
}
