// Ring 3: Business - a restored row must not collide with an active row's business key
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashSet;

use crate::database::entities::EntityDef;
use crate::database::record::Record;
use crate::database::store::StoreTransaction;
use crate::filter::{Filter, TrashedMode};
use crate::observer::context::{KeyReassignment, ObserverContext};
use crate::observer::error::ObserverError;
use crate::observer::traits::{Observer, ObserverRing, Operation, SyncObserver};
use crate::tenancy::{TenantId, TenantScope};

/// Detects business-key collisions for rows about to be restored and moves
/// the restored row to the next free number in its tenant.
///
/// Lookups are scoped to the restored row's own tenant, whoever the caller
/// is, so a super admin restore never compares keys across tenants.
#[derive(Default)]
pub struct RestoreConflictObserver;

impl Observer for RestoreConflictObserver {
    fn name(&self) -> &'static str {
        "RestoreConflictObserver"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::Business
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        op == Operation::Restore
    }

    fn applies_to_entity(&self, entity: &EntityDef) -> bool {
        entity.business_key.is_some()
    }
}

#[async_trait]
impl SyncObserver for RestoreConflictObserver {
    async fn execute(
        &self,
        ctx: &mut ObserverContext,
        tx: &mut dyn StoreTransaction,
    ) -> Result<(), ObserverError> {
        let Some(field) = ctx.entity.business_key else {
            return Ok(());
        };

        // Keys already taken by earlier rows of this batch
        let mut claimed: HashSet<(Option<TenantId>, i64)> = HashSet::new();
        let mut reassigned = Vec::new();

        for target in &ctx.targets {
            let Some(value) = target.get(field).filter(|v| !v.is_null()) else {
                continue;
            };
            let key = value.as_i64().ok_or_else(|| {
                ObserverError::ValidationError(format!(
                    "{}.{} must be an integer to resolve restore conflicts, got {}",
                    ctx.entity.name, field, value
                ))
            })?;
            let tenant = target.tenant_id();

            let collides = claimed.contains(&(tenant, key))
                || active_holder_exists(tx, ctx.entity, field, target, key).await?;

            if !collides {
                claimed.insert((tenant, key));
                continue;
            }

            let mut next = max_key(tx, ctx.entity, field, tenant).await?.max(key) + 1;
            while claimed.contains(&(tenant, next)) {
                next += 1;
            }
            claimed.insert((tenant, next));

            tracing::warn!(
                entity = ctx.entity.name,
                id = ?target.id(),
                tenant = ?tenant,
                "Restore collided on {} {}; reassigned to {}",
                field,
                key,
                next
            );

            reassigned.push(KeyReassignment {
                id: target.id(),
                tenant_id: tenant,
                field,
                from: key,
                to: next,
            });
        }

        ctx.reassigned = reassigned;
        Ok(())
    }
}

fn tenant_filter(entity: &EntityDef, tenant: Option<TenantId>, trashed: TrashedMode) -> Filter {
    let mut filter = Filter::for_entity(entity);
    filter.set_scope(match tenant {
        Some(t) => TenantScope::Tenant(t),
        None => TenantScope::Unscoped,
    });
    filter.set_trashed(trashed);
    filter
}

/// Another active row of the same tenant already holds `key`
async fn active_holder_exists(
    tx: &mut dyn StoreTransaction,
    entity: &EntityDef,
    field: &str,
    target: &Record,
    key: i64,
) -> Result<bool, ObserverError> {
    let mut filter = tenant_filter(entity, target.tenant_id(), TrashedMode::Without);
    let mut conditions = serde_json::Map::new();
    conditions.insert(field.to_string(), json!(key));
    if let Some(id) = target.id() {
        conditions.insert("id".to_string(), json!({ "$ne": id.to_string() }));
    }
    filter.where_clause(Value::Object(conditions))?;
    Ok(tx.count(&filter).await? > 0)
}

/// Highest key the tenant has ever used, deleted rows included
async fn max_key(
    tx: &mut dyn StoreTransaction,
    entity: &EntityDef,
    field: &str,
    tenant: Option<TenantId>,
) -> Result<i64, ObserverError> {
    let mut filter = tenant_filter(entity, tenant, TrashedMode::With);
    filter.where_clause(json!({ field: { "$null": false } }))?;
    filter.order(json!(format!("{} desc", field)))?;
    filter.limit(1, None)?;

    let rows = tx.select(&filter).await?;
    Ok(rows
        .first()
        .and_then(|row| row.get(field))
        .and_then(Value::as_i64)
        .unwrap_or(0))
}
