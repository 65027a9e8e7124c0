use serenity::all::{Client, GatewayIntents};

use crate::server::{bot::handler::Handler, config::Config, error::AppError, state::AppState};

/// Starts the Discord bot in a blocking manner
///
/// This function creates and starts the Discord bot client. It should be called from within
/// a tokio::spawn task since it will block until the bot shuts down.
///
/// # Arguments
/// - `config` - Application configuration holding the bot token
/// - `state` - Shared state handed to the event handler
///
/// # Returns
/// - `Ok(())` if the bot starts and runs successfully
/// - `Err(AppError)` if bot initialization or connection fails
pub async fn start_bot(config: &Config, state: AppState) -> Result<(), AppError> {
    // GUILD_MEMBERS is a privileged intent - must be enabled in Discord Developer Portal
    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_MEMBERS;

    let handler = Handler::new(state);

    let mut client = Client::builder(&config.discord_bot_token, intents)
        .event_handler(handler)
        .await?;

    tracing::info!("Starting Discord bot...");

    // Blocks until shutdown
    client.start().await?;

    Ok(())
}
