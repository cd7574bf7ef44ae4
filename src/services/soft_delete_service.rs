use serde::Serialize;
use std::collections::BTreeMap;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::audit::DELETED_AT;
use crate::database::record::Record;
use crate::database::repository::{Repository, RepositoryError, RestoreOutcome};
use crate::database::store::StoreTransaction;
use crate::filter::TrashedMode;
use crate::observer::ObserverContext;

/// Parent and child rows brought back by one cascading restore
#[derive(Debug, Clone, Serialize)]
pub struct CascadeRestore {
    #[serde(flatten)]
    pub parent: RestoreOutcome,
    /// Restored child rows keyed by child entity name
    pub children: BTreeMap<&'static str, Vec<Record>>,
}

/// Parent and child rows removed by one cascading delete
#[derive(Debug, Clone, Serialize)]
pub struct CascadeDelete {
    pub record: Record,
    pub children: BTreeMap<&'static str, Vec<Record>>,
}

type Steps = Vec<(Repository, ObserverContext)>;

/// Soft-delete operations spanning more than one entity
pub struct SoftDeleteService {
    repo: Repository,
}

impl SoftDeleteService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Delete a parent row and its active children with the same reason, in one unit of work.
    ///
    /// Children already in the trash keep their own stamp, so a later cascading
    /// restore leaves them deleted.
    pub async fn delete_cascade(&self, id: Uuid, reason: Option<&str>) -> Result<CascadeDelete, RepositoryError> {
        let mut tx = self.repo.store().begin().await?;
        let mut steps = Steps::new();
        let result = self.delete_steps(tx.as_mut(), &mut steps, id, reason).await;
        self.settle(tx, result, &steps).await?;

        let mut steps = steps.into_iter();
        let record = steps
            .next()
            .and_then(|(_, ctx)| ctx.into_result().into_iter().next())
            .ok_or_else(|| RepositoryError::Internal("cascade delete lost its parent".to_string()))?;
        let children: BTreeMap<_, _> = steps
            .map(|(repo, ctx)| (repo.entity().name, ctx.into_result()))
            .collect();

        tracing::info!(
            entity = self.repo.entity().name,
            %id,
            children = children.values().map(Vec::len).sum::<usize>(),
            "cascade delete complete"
        );
        Ok(CascadeDelete { record, children })
    }

    /// Restore a parent row and the children deleted along with it, in one unit of work.
    ///
    /// Only children whose `deleted_at` is at or after the parent's come back;
    /// items removed on their own beforehand stay in the trash. Key conflict
    /// resolution runs on the parent as for a plain restore. Any failure rolls the
    /// whole cascade back.
    pub async fn restore_cascade(&self, id: Uuid) -> Result<CascadeRestore, RepositoryError> {
        let mut tx = self.repo.store().begin().await?;
        let mut steps = Steps::new();
        let result = self.restore_steps(tx.as_mut(), &mut steps, id).await;
        self.settle(tx, result, &steps).await?;

        let mut steps = steps.into_iter();
        let parent = steps
            .next()
            .map(|(_, ctx)| Repository::restore_outcome(ctx))
            .ok_or_else(|| RepositoryError::Internal("cascade restore lost its parent".to_string()))?;
        let children = steps
            .map(|(repo, ctx)| (repo.entity().name, ctx.into_result()))
            .collect();

        tracing::info!(
            entity = self.repo.entity().name,
            %id,
            reassigned = parent.reassigned.len(),
            "cascade restore complete"
        );
        Ok(CascadeRestore { parent, children })
    }

    async fn delete_steps(
        &self,
        tx: &mut dyn StoreTransaction,
        steps: &mut Steps,
        id: Uuid,
        reason: Option<&str>,
    ) -> Result<(), RepositoryError> {
        // A parent already in the trash is stamped again, like a plain delete
        let parent_repo = if self.repo.entity().audited {
            self.repo.clone().with_trashed()
        } else {
            self.repo.clone()
        };
        let parent = parent_repo
            .delete_in(tx, json!({ "id": id.to_string() }), reason, true)
            .await?;
        steps.push((parent_repo, parent));

        for child in self.repo.entity().children {
            let repo = self.repo.sibling(child.entity).trashed(TrashedMode::Without);
            let ctx = repo
                .delete_in(tx, json!({ child.foreign_key: id.to_string() }), reason, false)
                .await?;
            steps.push((repo, ctx));
        }
        Ok(())
    }

    async fn restore_steps(&self, tx: &mut dyn StoreTransaction, steps: &mut Steps, id: Uuid) -> Result<(), RepositoryError> {
        let parent = self
            .repo
            .restore_in(tx, json!({ "id": id.to_string() }), true)
            .await?;
        let since = parent.targets.first().and_then(|r| r.get(DELETED_AT)).cloned();
        steps.push((self.repo.clone(), parent));

        for child in self.repo.entity().children {
            let repo = self.repo.sibling(child.entity);
            let ctx = repo
                .restore_in(tx, deleted_with_parent(child.foreign_key, id, since.as_ref()), false)
                .await?;
            steps.push((repo, ctx));
        }
        Ok(())
    }

    /// Commit or roll back, then run the audit ring for every step
    async fn settle(
        &self,
        mut tx: Box<dyn StoreTransaction>,
        result: Result<(), RepositoryError>,
        steps: &Steps,
    ) -> Result<(), RepositoryError> {
        if let Err(error) = result {
            if let Err(rollback_error) = tx.rollback().await {
                tracing::error!("Rollback failed after {}: {}", error, rollback_error);
            }
            return Err(error);
        }
        tx.commit().await?;

        for (repo, ctx) in steps {
            repo.finish(ctx).await;
        }
        Ok(())
    }
}

/// Children pointing at `id` that were deleted no earlier than the parent
fn deleted_with_parent(foreign_key: &str, id: Uuid, parent_deleted_at: Option<&Value>) -> Value {
    match parent_deleted_at {
        Some(at) => json!({ foreign_key: id.to_string(), DELETED_AT: { "$gte": at } }),
        None => json!({ foreign_key: id.to_string() }),
    }
}
