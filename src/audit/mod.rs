//! Soft-delete audit trail.
//!
//! Deleting an audited entity records who deleted it, when and why, then marks
//! it with `deleted_at`. Restore and purge both clear the four audit fields.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::database::record::Record;
use crate::tenancy::Principal;

pub const DELETED_AT: &str = "deleted_at";
pub const DELETED_BY_ID: &str = "usuario_exclusao_id";
pub const DELETED_BY_NAME: &str = "usuario_exclusao_nome";
pub const DELETED_ON: &str = "data_exclusao";
pub const DELETION_REASON: &str = "justificativa_exclusao";

/// The four attribution fields written together with a soft delete
pub const AUDIT_FIELDS: [&str; 4] = [DELETED_BY_ID, DELETED_BY_NAME, DELETED_ON, DELETION_REASON];

/// Lifecycle of an audited row. Purged rows no longer exist, so there is no variant for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditState {
    Active,
    Deleted,
}

impl AuditState {
    pub fn of(record: &Record) -> Self {
        if record.is_trashed() {
            AuditState::Deleted
        } else {
            AuditState::Active
        }
    }
}

/// Attribution for one soft delete
#[derive(Debug, Clone, PartialEq)]
pub struct DeletionAudit {
    pub deleted_by_id: Option<Uuid>,
    pub deleted_by_name: Option<String>,
    pub deleted_on: DateTime<Utc>,
    pub reason: String,
}

impl DeletionAudit {
    /// Build the attribution for a delete issued now.
    ///
    /// A blank or missing reason falls back to `default_reason`. Without a
    /// principal the deleter fields stay empty.
    pub fn new(
        principal: Option<&Principal>,
        reason: Option<&str>,
        default_reason: &str,
        now: DateTime<Utc>,
    ) -> Self {
        let reason = reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(default_reason)
            .to_string();

        Self {
            deleted_by_id: principal.map(|p| p.id),
            deleted_by_name: principal.map(|p| p.name.clone()),
            deleted_on: now,
            reason,
        }
    }

    pub fn is_attributed(&self) -> bool {
        self.deleted_by_id.is_some()
    }

    /// Read the attribution back from a stored row
    pub fn from_record(record: &Record) -> Option<Self> {
        let deleted_on = record.timestamp(DELETED_ON)?;
        Some(Self {
            deleted_by_id: record
                .get(DELETED_BY_ID)
                .and_then(|v| v.as_str())
                .and_then(|s| Uuid::parse_str(s).ok()),
            deleted_by_name: record
                .get(DELETED_BY_NAME)
                .and_then(|v| v.as_str())
                .map(str::to_string),
            deleted_on,
            reason: record
                .get(DELETION_REASON)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
        })
    }

    /// The four audit columns as a change set
    pub fn fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert(
            DELETED_BY_ID.to_string(),
            self.deleted_by_id
                .map(|id| Value::String(id.to_string()))
                .unwrap_or(Value::Null),
        );
        fields.insert(
            DELETED_BY_NAME.to_string(),
            self.deleted_by_name.clone().map(Value::String).unwrap_or(Value::Null),
        );
        fields.insert(DELETED_ON.to_string(), timestamp_value(self.deleted_on));
        fields.insert(DELETION_REASON.to_string(), Value::String(self.reason.clone()));
        fields
    }
}

/// Change set that marks a row deleted
pub fn deletion_marker(at: DateTime<Utc>) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert(DELETED_AT.to_string(), timestamp_value(at));
    fields
}

/// Change set nulling the four audit fields (purge)
pub fn cleared_audit_fields() -> Map<String, Value> {
    AUDIT_FIELDS
        .iter()
        .map(|f| (f.to_string(), Value::Null))
        .collect()
}

/// Change set returning a deleted row to active (restore)
pub fn restoration() -> Map<String, Value> {
    let mut fields = cleared_audit_fields();
    fields.insert(DELETED_AT.to_string(), Value::Null);
    fields
}

/// Timestamps are stored as fixed-width RFC 3339 UTC text so they sort lexically
pub fn timestamp_value(at: DateTime<Utc>) -> Value {
    Value::String(at.to_rfc3339_opts(SecondsFormat::Micros, true))
}
