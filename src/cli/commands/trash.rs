use clap::Subcommand;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::audit::{DELETED_AT, DELETED_BY_NAME, DELETION_REASON};
use crate::cli::utils::{output_records, output_success, output_value};
use crate::cli::{AdminContext, OutputFormat};
use crate::filter::FilterData;
use crate::services::SoftDeleteService;
use crate::tenancy::{TenantId, TENANT_FIELD};

#[derive(Subcommand)]
pub enum TrashCommands {
    #[command(about = "List soft-deleted records")]
    List {
        #[arg(help = "Entity name, e.g. work_orders")]
        entity: String,
        #[arg(long, help = "Restrict to one tenant")]
        tenant: Option<TenantId>,
        #[arg(long, default_value_t = 100)]
        limit: i32,
    },

    #[command(about = "Restore a soft-deleted record")]
    Restore {
        entity: String,
        id: Uuid,
        #[arg(long, help = "Also restore soft-deleted child records")]
        cascade: bool,
    },

    #[command(about = "Permanently remove a record")]
    Purge {
        entity: String,
        id: Uuid,
        #[arg(long, help = "Confirm the irreversible removal")]
        yes: bool,
    },
}

pub async fn handle(ctx: &AdminContext, cmd: TrashCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        TrashCommands::List { entity, tenant, limit } => {
            let repo = ctx.repository(&entity)?.only_trashed();
            let records = repo
                .select_any(FilterData {
                    where_clause: Some(tenant_filter(tenant)),
                    order: Some(json!({ DELETED_AT: "desc" })),
                    limit: Some(limit),
                    offset: None,
                })
                .await?;
            output_records(
                output_format,
                &records,
                &["id", TENANT_FIELD, DELETED_AT, DELETED_BY_NAME, DELETION_REASON],
            )
        }
        TrashCommands::Restore { entity, id, cascade } => {
            let repo = ctx.repository(&entity)?;
            if cascade {
                let outcome = SoftDeleteService::new(repo).restore_cascade(id).await?;
                output_value(output_format, &outcome, || {
                    println!("✓ Restored {} {}", entity, id);
                    for (child, rows) in &outcome.children {
                        println!("  {} {} restored", rows.len(), child);
                    }
                    for moved in &outcome.parent.reassigned {
                        println!("  {} reassigned {} -> {}", moved.field, moved.from, moved.to);
                    }
                })
            } else {
                let outcome = repo.restore(id).await?;
                output_value(output_format, &outcome, || {
                    println!("✓ Restored {} {}", entity, id);
                    for moved in &outcome.reassigned {
                        println!("  {} reassigned {} -> {}", moved.field, moved.from, moved.to);
                    }
                })
            }
        }
        TrashCommands::Purge { entity, id, yes } => {
            if !yes {
                anyhow::bail!("Purge is irreversible; pass --yes to confirm");
            }
            let record = ctx.repository(&entity)?.purge(id).await?;
            output_success(
                output_format,
                &format!("Purged {} {}", entity, id),
                Some(record.to_json()),
            )
        }
    }
}

/// Explicit tenant condition paired with the bypassed scope
pub(crate) fn tenant_filter(tenant: Option<TenantId>) -> Value {
    let mut conditions = Map::new();
    if let Some(tenant) = tenant {
        conditions.insert(TENANT_FIELD.to_string(), tenant.to_value());
    }
    Value::Object(conditions)
}
