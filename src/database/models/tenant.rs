use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::database::record::{Record, RecordError};
use crate::tenancy::TenantId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
    pub active: bool,
    pub plan: Option<String>,
    pub max_users: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<Record> for Tenant {
    type Error = RecordError;

    fn try_from(record: Record) -> Result<Self, Self::Error> {
        serde_json::from_value(record.to_json()).map_err(|e| RecordError::InvalidJson(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tenant_from_stored_row() {
        let id = TenantId::new();
        let record = Record::from_sql_data(
            json!({
                "id": id.to_string(),
                "name": "Oficina Central",
                "active": true,
                "plan": "pro",
                "max_users": 5,
                "created_at": "2024-03-01T12:00:00.000000Z",
                "updated_at": "2024-03-01T12:00:00.000000Z"
            })
            .as_object()
            .cloned()
            .unwrap(),
        );

        let tenant = Tenant::try_from(record).unwrap();
        assert_eq!(tenant.id, id);
        assert!(tenant.active);
        assert_eq!(tenant.max_users, Some(5));
    }
}
