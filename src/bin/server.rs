//! roost server: loads `roost.json` (or `ROOST_CONFIG`), resolves the entity schema, creates
//! missing tables, mounts CRUD routes, and serves them with the common routes.

use roost::config::config_path;
use roost::sql::Dialect;
use roost::{app, ensure_tables, load_app_config, load_schema, optimize, AppState, Database, EntryPoint};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("roost=info".parse()?))
        .init();

    let config_file = config_path();
    let config = load_app_config(&config_file).await?;
    let schema = load_schema(&config, &config_file).await?;
    let dialect = Dialect::from_provider(&config.database.provider)?;

    let db = Database::connect(&config.database).await?;
    ensure_tables(&db, &schema).await?;

    let mut entry = EntryPoint::new(&config.url_prefix)?;
    entry.mount_all(&schema, &config.mounts)?;
    if config.optimize {
        optimize(&mut entry, &schema, dialect)?;
    }

    let state = AppState::new(schema, db, entry);
    let router = app(state, config.body_limit);

    let listener = TcpListener::bind(&config.listen).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, router).await?;
    Ok(())
}
