use anyhow::Result;
use diesel_migrations::{EmbeddedMigrations, embed_migrations};
use foodhub_orderservice::{
    app_state::AppState,
    bootstrap::{self, bootstrap},
    config, db,
};

/// Migrations embedded into the binary which helps with streamlining image building process
const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

#[tokio::main]
async fn main() -> Result<()> {
    bootstrap::init();

    let config = config::load()?;

    tracing::info!("Running migrations...");
    let migrations_count = db::run_migrations_blocking(MIGRATIONS, &config.database.url).await?;
    tracing::info!("Run {} new migrations successfully", migrations_count);

    let db_pool = db::create_pool(&config.database).await?;
    let app = bootstrap::build_app(AppState::new(db_pool));

    tracing::info!("Bootstrapping...");
    bootstrap("OrderService", app, &config.server).await?;
    Ok(())
}
