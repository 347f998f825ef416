mod bot;

use anyhow::Result;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use tactical_trading_bot::config::Config;
use tactical_trading_bot::providers::replay::ticks_from_bar;
use tactical_trading_bot::providers::{PaperTransport, ReplayProvider};

use crate::bot::TacticalBot;

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cfg.log_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .init();

    let data_dir = PathBuf::from(std::env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()));
    let replay = ReplayProvider::new(data_dir.clone());
    let transport = Box::new(PaperTransport::new(Some(
        data_dir.join("paper_trades.jsonl"),
    )));

    let instruments = cfg.instruments.clone();
    let shared_config = cfg.shared();

    let mut bot = TacticalBot::new(
        shared_config,
        Box::new(replay.clone()),
        Box::new(replay.clone()),
        transport,
    )
    .await;
    bot.bootstrap().await?;

    // Replay the latest recorded session as a live tick feed.
    let feed = bot.tick_sender();
    tokio::spawn(async move {
        for instrument in instruments {
            let bars = match replay.session_bars(&instrument) {
                Ok(bars) => bars,
                Err(e) => {
                    error!(instrument = %instrument, error = %e, "no session data");
                    continue;
                }
            };
            for bar in bars.iter() {
                for tick in ticks_from_bar(&instrument, bar) {
                    if feed.send(tick).await.is_err() {
                        return;
                    }
                }
            }
            info!(instrument = %instrument, "session replay complete");
        }
    });

    bot.run().await?;

    Ok(())
}
