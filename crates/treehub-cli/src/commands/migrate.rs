//! Index migration command.

use treehub_core::config::AppConfig;
use treehub_core::error::AppError;
use treehub_database::DatabasePool;
use treehub_database::migration::run_migrations;

use crate::output;

/// Execute the migrate command
pub async fn execute(config: &AppConfig) -> Result<(), AppError> {
    let db = DatabasePool::connect(&config.database).await?;
    println!("Running index migrations...");
    run_migrations(db.pool()).await?;
    db.close().await;
    output::print_success("All migrations applied successfully.");
    Ok(())
}
