use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::{output_success, output_value};
use crate::cli::{AdminContext, OutputFormat};
use crate::services::TenantService;
use crate::tenancy::TenantId;

#[derive(Subcommand)]
pub enum TenantCommands {
    #[command(about = "List all tenants")]
    List,

    #[command(about = "Create new tenant")]
    Create {
        #[arg(help = "Tenant name")]
        name: String,
        #[arg(long)]
        plan: Option<String>,
        #[arg(long)]
        max_users: Option<i32>,
    },

    #[command(about = "Allow the tenant's users back in")]
    Activate { tenant: TenantId },

    #[command(about = "Refuse every request from the tenant's users")]
    Deactivate { tenant: TenantId },
}

pub async fn handle(ctx: &AdminContext, cmd: TenantCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let service = TenantService::new(ctx.store.clone(), ctx.pipeline.clone());

    match cmd {
        TenantCommands::List => {
            let tenants = service.list().await?;
            output_value(output_format, &tenants, || {
                if tenants.is_empty() {
                    println!("No tenants configured");
                    return;
                }
                println!("{:<38} {:<25} {:<8} {:<10} {}", "ID", "NAME", "ACTIVE", "PLAN", "MAX USERS");
                println!("{}", "-".repeat(95));
                for t in &tenants {
                    println!(
                        "{:<38} {:<25} {:<8} {:<10} {}",
                        t.id,
                        t.name,
                        t.active,
                        t.plan.as_deref().unwrap_or("-"),
                        t.max_users.map_or("-".to_string(), |n| n.to_string())
                    );
                }
            })
        }
        TenantCommands::Create { name, plan, max_users } => {
            let tenant = service.create(&name, plan.as_deref(), max_users).await?;
            output_success(
                output_format,
                &format!("Tenant '{}' created: {}", tenant.name, tenant.id),
                Some(json!(tenant)),
            )
        }
        TenantCommands::Activate { tenant } => {
            service.set_active(tenant, true).await?;
            output_success(output_format, &format!("Tenant {} activated", tenant), None)
        }
        TenantCommands::Deactivate { tenant } => {
            service.set_active(tenant, false).await?;
            output_success(output_format, &format!("Tenant {} deactivated", tenant), None)
        }
    }
}
