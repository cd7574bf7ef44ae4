use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::HashSet;
use uuid::Uuid;

use crate::audit;
use crate::tenancy::{TenantId, TENANT_FIELD};

/// System fields that can only be set by observers, not by API input.
/// `tenant_id` is deliberately absent: a supplied value is overridden, not rejected.
const SYSTEM_FIELDS: &[&str] = &[
    "id",
    "created_at",
    "updated_at",
    audit::DELETED_AT,
    audit::DELETED_BY_ID,
    audit::DELETED_BY_NAME,
    audit::DELETED_ON,
    audit::DELETION_REASON,
];

/// Errors that can occur during Record operations
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("System field '{0}' cannot be set via API input")]
    SystemFieldNotAllowed(&'static str),
    #[error("Invalid JSON format: {0}")]
    InvalidJson(String),
    #[error("Missing required field: {0}")]
    MissingRequiredField(String),
}

/// A dynamic record that can represent any database row with change tracking
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Map<String, Value>,
    /// Fields touched since the record was loaded or built
    modified_fields: HashSet<String>,
}

impl Record {
    /// Create a new empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Create record from API input JSON, rejecting system fields
    pub fn from_json(json: Value) -> Result<Self, RecordError> {
        match json {
            Value::Object(map) => {
                let mut record = Self::new();
                for (key, value) in map {
                    if let Some(field) = SYSTEM_FIELDS.iter().find(|&&f| f == key) {
                        return Err(RecordError::SystemFieldNotAllowed(*field));
                    }
                    record.modified_fields.insert(key.clone());
                    record.fields.insert(key, value);
                }
                Ok(record)
            }
            _ => Err(RecordError::InvalidJson("Expected JSON object".to_string())),
        }
    }

    /// Create record from storage row data (allows system fields)
    pub fn from_sql_data(data: Map<String, Value>) -> Self {
        Self {
            fields: data,
            modified_fields: HashSet::new(),
        }
    }

    /// Get field value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Set a user field. System fields are ignored with a warning.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        let key = key.into();

        if SYSTEM_FIELDS.contains(&key.as_str()) {
            tracing::warn!("Attempted to set system field '{}' - ignoring", key);
            return self;
        }

        self.modified_fields.insert(key.clone());
        self.fields.insert(key, value.into());
        self
    }

    /// Set system field (for observers only)
    pub fn set_system_field(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        let key = key.into();
        self.modified_fields.insert(key.clone());
        self.fields.insert(key, value.into());
        self
    }

    /// Apply several system fields at once
    pub fn apply(&mut self, changes: &Map<String, Value>) -> &mut Self {
        for (key, value) in changes {
            self.set_system_field(key.clone(), value.clone());
        }
        self
    }

    /// Remove field and return its value
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.modified_fields.remove(key);
        self.fields.remove(key)
    }

    // ========================================
    // Standard field accessors
    // ========================================

    pub fn id(&self) -> Option<Uuid> {
        self.get("id").and_then(|v| v.as_str()).and_then(|s| Uuid::parse_str(s).ok())
    }

    pub fn set_id(&mut self, id: Uuid) -> &mut Self {
        self.set_system_field("id", Value::String(id.to_string()))
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.get(TENANT_FIELD).and_then(TenantId::from_value)
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp("created_at")
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp("updated_at")
    }

    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp(audit::DELETED_AT)
    }

    /// Check if record is soft deleted
    pub fn is_trashed(&self) -> bool {
        self.get(audit::DELETED_AT).is_some_and(|v| !v.is_null())
    }

    pub fn timestamp(&self, key: &str) -> Option<DateTime<Utc>> {
        self.get(key)
            .and_then(|v| v.as_str())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    // ========================================
    // Change tracking
    // ========================================

    /// Fields set through `set`, `set_system_field` or API input, with their current values
    pub fn changes(&self) -> Map<String, Value> {
        self.modified_fields
            .iter()
            .filter_map(|k| self.fields.get(k).map(|v| (k.clone(), v.clone())))
            .collect()
    }

    pub fn has_changes(&self) -> bool {
        !self.modified_fields.is_empty()
    }

    // ========================================
    // Serialization
    // ========================================

    pub fn to_json(&self) -> Value {
        Value::Object(self.fields.clone())
    }

    pub fn to_map(&self) -> Map<String, Value> {
        self.fields.clone()
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Validate that required fields are present and not null
    pub fn validate_required_fields(&self, fields: &[&str]) -> Result<(), RecordError> {
        for &field in fields {
            match self.get(field) {
                None | Some(Value::Null) => {
                    return Err(RecordError::MissingRequiredField(field.to_string()))
                }
                Some(_) => continue,
            }
        }
        Ok(())
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Self::from_sql_data(map)
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Object(record.fields)
    }
}

/// Serialized as the plain field map
impl serde::Serialize for Record {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}

impl std::fmt::Display for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Record(id: {:?}, tenant: {:?}, fields: {}, trashed: {})",
            self.id(),
            self.tenant_id(),
            self.fields.len(),
            self.is_trashed()
        )
    }
}
