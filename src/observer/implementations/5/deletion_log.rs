// Ring 5: Audit - structured log of every lifecycle transition on audited entities
use async_trait::async_trait;

use crate::config::CONFIG;
use crate::database::entities::EntityDef;
use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::observer::traits::{AuditObserver, Observer, ObserverRing, Operation};

#[derive(Default)]
pub struct DeletionLogObserver;

impl Observer for DeletionLogObserver {
    fn name(&self) -> &'static str {
        "DeletionLogObserver"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::Audit
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        matches!(op, Operation::Delete | Operation::Restore | Operation::Purge)
    }

    fn applies_to_entity(&self, entity: &EntityDef) -> bool {
        entity.audited
    }
}

#[async_trait]
impl AuditObserver for DeletionLogObserver {
    async fn execute(&self, ctx: &ObserverContext) -> Result<(), ObserverError> {
        if !CONFIG.security.enable_audit_logging {
            return Ok(());
        }

        let ids: Vec<_> = ctx
            .result
            .iter()
            .flatten()
            .filter_map(|record| record.id())
            .collect();
        if ids.is_empty() {
            return Ok(());
        }

        let actor = ctx.principal().map(|p| p.id);
        match ctx.operation {
            Operation::Delete => {
                let reason = ctx.deletion.as_ref().map(|d| d.reason.as_str());
                tracing::info!(entity = ctx.entity.name, ?ids, ?actor, ?reason, "soft deleted");
            }
            Operation::Restore => {
                tracing::info!(
                    entity = ctx.entity.name,
                    ?ids,
                    ?actor,
                    reassigned = ctx.reassigned.len(),
                    "restored"
                );
            }
            Operation::Purge => {
                tracing::info!(entity = ctx.entity.name, ?ids, ?actor, "purged");
            }
            _ => {}
        }
        Ok(())
    }
}
