use chrono::Utc;
use clap::Subcommand;
use serde_json::json;

use super::trash::tenant_filter;
use crate::cli::utils::output_records;
use crate::cli::{AdminContext, OutputFormat};
use crate::filter::FilterData;
use crate::tenancy::{TenantId, TENANT_FIELD};

/// Work order statuses that are no longer pending
const CLOSED_STATUSES: &[&str] = &["concluida", "cancelada", "entregue"];

#[derive(Subcommand)]
pub enum ReportCommands {
    #[command(about = "Open work orders past their due date, across all tenants")]
    Overdue {
        #[arg(long, help = "Restrict to one tenant")]
        tenant: Option<TenantId>,
        #[arg(long, help = "Reference date (YYYY-MM-DD), defaults to today")]
        date: Option<chrono::NaiveDate>,
    },
}

pub async fn handle(ctx: &AdminContext, cmd: ReportCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        ReportCommands::Overdue { tenant, date } => {
            let today = date.unwrap_or_else(|| Utc::now().date_naive());
            let mut conditions = tenant_filter(tenant);
            conditions["data_prevista"] = json!({ "$lt": today.format("%Y-%m-%d").to_string() });
            conditions["status"] = json!({ "$nin": CLOSED_STATUSES });

            let records = ctx
                .work_orders()
                .select_any(FilterData {
                    where_clause: Some(conditions),
                    order: Some(json!(["tenant_id", "data_prevista"])),
                    ..Default::default()
                })
                .await?;

            tracing::info!(count = records.len(), %today, "overdue work orders");
            output_records(
                output_format,
                &records,
                &[TENANT_FIELD, "numero", "status", "data_prevista"],
            )
        }
    }
}
