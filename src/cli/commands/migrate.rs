use anyhow::Context;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::database::manager::DatabaseManager;

pub async fn handle(url: Option<&str>, output_format: OutputFormat) -> anyhow::Result<()> {
    let url = url.context("DATABASE_URL is required for migrations")?;
    let pool = DatabaseManager::pool_for(url).await?;
    DatabaseManager::migrate(&pool).await?;

    output_success(
        output_format,
        &format!("Migrations applied to {}", DatabaseManager::redact(url)),
        None,
    )
}
