//! coin_shop bootstrap
//!
//! Loads configuration, sets up logging and the token signing secret, brings
//! the PostgreSQL schema up to date and wires the ledger services. The HTTP
//! transport mounts `AppState` elsewhere; this binary only verifies that
//! everything it needs is reachable.

use std::sync::Arc;

use anyhow::Context;

use coin_shop::catalog::{Catalog, PgCatalog};
use coin_shop::config::AppConfig;
use coin_shop::db::Database;
use coin_shop::state::AppState;
use coin_shop::user_auth::{TokenPolicy, init_signing_secret};
use coin_shop::{AccountStore, PgAccountStore};

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let app_config = AppConfig::load(&env)
        .with_context(|| format!("Failed to load configuration for env '{}'", env))?;
    let _log_guard = coin_shop::logging::init_logging(&app_config);

    tracing::info!(
        env = %env,
        version = env!("CARGO_PKG_VERSION"),
        git = env!("GIT_HASH"),
        "Starting coin_shop"
    );

    init_signing_secret(&app_config.auth.jwt_secret)
        .context("Failed to initialize token signing secret")?;

    let db = Database::connect(
        &app_config.postgres_url,
        app_config.postgres_max_connections,
    )
    .await
    .context("Failed to connect to PostgreSQL")?;
    db.migrate().await.context("Failed to apply migrations")?;
    db.health_check()
        .await
        .context("PostgreSQL health check failed")?;

    let store: Arc<dyn AccountStore> = Arc::new(PgAccountStore::new(db.pool().clone()));
    let catalog = Arc::new(PgCatalog::new(db.pool().clone()));
    let items = catalog.items().await.context("Failed to load catalog")?;

    let policy = TokenPolicy::from(&app_config.auth);
    let state = AppState::new(store, catalog, policy).context("Failed to wire services")?;

    tracing::info!(
        store = state.ledger.store().name(),
        catalog_items = items.len(),
        token_ttl_hours = app_config.auth.token_ttl_hours,
        starting_balance = policy.starting_balance,
        "Ledger services ready"
    );

    Ok(())
}
