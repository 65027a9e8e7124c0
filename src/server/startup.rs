use std::{sync::Arc, time::Duration};

use crate::server::{
    config::Config,
    error::AppError,
    store::{MemoryStore, RedisStore, SharedStore},
};

/// Connects to the database and runs pending migrations.
///
/// Establishes a connection pool using the connection string from configuration, then
/// automatically runs all pending SeaORM migrations to ensure the database schema is
/// up-to-date. This function must complete successfully before the application can
/// access the database.
///
/// # Arguments
/// - `config` - Application configuration containing the database URL
///
/// # Returns
/// - `Ok(DatabaseConnection)` - Connected database with migrations applied
/// - `Err(Error)` - Failed to connect to database or run migrations
pub async fn connect_to_database(config: &Config) -> Result<sea_orm::DatabaseConnection, AppError> {
    use migration::{Migrator, MigratorTrait};
    use sea_orm::{ConnectOptions, Database};

    let mut opt = ConnectOptions::new(&config.database_url);
    opt.sqlx_logging(false);

    let db = Database::connect(opt).await?;

    Migrator::up(&db, None).await?;

    Ok(db)
}

/// Connects the shared key-value store.
///
/// Without `REDIS_URL` the in-process store is used, which only coordinates the workers
/// of this one process.
///
/// # Returns
/// - `Ok(Arc<dyn SharedStore>)` - Connected store
/// - `Err(AppError::StoreErr)` - Redis URL invalid or unreachable
pub async fn connect_store(config: &Config) -> Result<Arc<dyn SharedStore>, AppError> {
    match &config.redis_url {
        Some(url) => {
            let store = RedisStore::connect(url).await?;
            tracing::info!("Connected to shared store");
            Ok(Arc::new(store))
        }
        None => {
            tracing::warn!("REDIS_URL not set, using in-process store");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

/// Builds the HTTP client used by the gateway transport.
///
/// Redirects are not followed; a redirect comes back as a non-success status.
pub fn setup_reqwest_client() -> Result<reqwest::Client, AppError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .redirect(reqwest::redirect::Policy::none())
        .build()?;

    Ok(client)
}

/// Installs the global tracing subscriber at the configured level.
///
/// An unrecognized level falls back to `info`.
pub fn init_tracing(config: &Config) {
    let level = config
        .log_level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::INFO);

    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(level)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to install tracing subscriber: {}", e);
    }
}
