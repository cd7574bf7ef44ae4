pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::CONFIG;
use crate::database::repository::Repository;
use crate::database::store::Store;
use crate::database::{connect_store, entities, RepositoryError};
use crate::observer::ObserverPipeline;
use crate::tenancy::ExecutionContext;

#[derive(Parser)]
#[command(name = "retail-admin")]
#[command(about = "Administrative and recovery tooling: runs without a principal, across tenants")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text, help = "Output format")]
    pub format: OutputFormat,

    #[arg(long, global = true, help = "Database URL (defaults to DATABASE_URL)")]
    pub database_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Apply database migrations")]
    Migrate,

    #[command(about = "Soft-deleted records: list, restore, purge")]
    Trash {
        #[command(subcommand)]
        cmd: commands::trash::TrashCommands,
    },

    #[command(about = "Tenant directory")]
    Tenant {
        #[command(subcommand)]
        cmd: commands::tenant::TenantCommands,
    },

    #[command(about = "Cross-tenant reports")]
    Report {
        #[command(subcommand)]
        cmd: commands::report::ReportCommands,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Yaml,
}

/// Storage handles shared by every command
pub struct AdminContext {
    pub store: Arc<dyn Store>,
    pub pipeline: Arc<ObserverPipeline>,
}

impl AdminContext {
    /// Background-context repository with the tenant filter bypassed.
    ///
    /// Commands that must stay inside one tenant add `tenant_id` to their own filter.
    pub fn repository(&self, entity: &str) -> Result<Repository, RepositoryError> {
        Ok(Repository::for_name(
            entity,
            self.store.clone(),
            self.pipeline.clone(),
            None,
            ExecutionContext::Background,
        )?
        .without_tenant_scope())
    }

    pub fn work_orders(&self) -> Repository {
        Repository::new(
            entities::WORK_ORDERS,
            self.store.clone(),
            self.pipeline.clone(),
            None,
            ExecutionContext::Background,
        )
        .without_tenant_scope()
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = cli.format;
    let url = cli.database_url.or_else(|| CONFIG.database.url.clone());

    if let Commands::Migrate = cli.command {
        return commands::migrate::handle(url.as_deref(), output_format).await;
    }

    let ctx = AdminContext {
        store: connect_store(url.as_deref()).await?,
        pipeline: Arc::new(ObserverPipeline::standard()),
    };

    match cli.command {
        Commands::Migrate => Ok(()),
        Commands::Trash { cmd } => commands::trash::handle(&ctx, cmd, output_format).await,
        Commands::Tenant { cmd } => commands::tenant::handle(&ctx, cmd, output_format).await,
        Commands::Report { cmd } => commands::report::handle(&ctx, cmd, output_format).await,
    }
}
