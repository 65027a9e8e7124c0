mod server;

use std::sync::Arc;

use crate::server::{
    bot,
    config::Config,
    error::AppError,
    gateway::{bucket::BucketRegistry, transport::ReqwestTransport, Credential, Gateway},
    scheduler::verification,
    startup,
    state::AppState,
    task::{queue::TaskQueue, worker::Worker},
};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    startup::init_tracing(&config);

    let db = startup::connect_to_database(&config).await?;
    let store = startup::connect_store(&config).await?;
    let http_client = startup::setup_reqwest_client()?;

    let registry = BucketRegistry::new(store.clone(), config.limits.clone());
    let gateway = Gateway::new(
        Arc::new(ReqwestTransport::new(http_client)),
        registry,
        config.discord_api_url.clone(),
        config.torn_api_url.clone(),
    );

    let state = AppState {
        db,
        store: store.clone(),
        gateway: Arc::new(gateway),
        queue: TaskQueue::new(store),
        bot: Credential::Bot(config.discord_bot_token.clone()),
        retry: config.retry,
        verify: config.verify,
    };

    tracing::info!("Starting {} workers", config.worker_count);

    for id in 0..config.worker_count {
        let worker = Worker::new(id, state.clone());
        tokio::spawn(worker.run());
    }

    verification::start_scheduler(state.queue.clone()).await?;

    // The bot runs until shutdown and keeps the process alive
    bot::start::start_bot(&config, state).await
}
