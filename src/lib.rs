pub mod broker;
pub mod channel;
pub mod command;
pub mod config;
pub mod error;
pub mod handlers;
pub mod heartbeat;
pub mod log_store;
pub mod message;
pub mod server;
pub mod session;

use std::sync::Arc;

use broker::Broker;
use config::Config;
use error::Result;

/// Boots the broker: replays every channel's log into memory, then
/// serves connections until the listener fails.
pub async fn run(config: Config) -> Result<()> {
    std::fs::create_dir_all(&config.log_dir)?;

    let replayed = log_store::replay_all(&config.log_dir)?;
    let broker = Arc::new(Broker::new(config.log_dir.clone(), config.max_backlog));
    for (name, messages) in replayed {
        let count = messages.len();
        let channel = broker.get_or_create_channel(&name);
        channel.replay(messages);
        eprintln!("nimbus: replayed {count} messages for channel {name}");
    }

    server::run(broker, &config.addr, config.heartbeat_interval, config.heartbeat_timeout).await?;
    Ok(())
}
