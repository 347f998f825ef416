use anyhow::Result;
use chrono::Utc;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use tactical_trading_bot::config::SharedConfig;
use tactical_trading_bot::core::day_type::compute_hunter_zone;
use tactical_trading_bot::core::session::is_market_hours;
use tactical_trading_bot::engine::{
    spawn_worker, InstrumentEngine, InstrumentEvent, Intent, WorkerHandle,
};
use tactical_trading_bot::models::Tick;
use tactical_trading_bot::options::calculate_pcr;
use tactical_trading_bot::providers::{HistoricalBars, OptionChainProvider, OrderTransport};

const WARMUP_DAYS: u32 = 2;

/// Orchestrates one worker task per instrument and acts on the trade
/// intents they emit. Holds the only mutable handle to the transport, so
/// order submission is serialized even with many instruments.
pub struct TacticalBot {
    config: SharedConfig,
    history: Box<dyn HistoricalBars>,
    chains: Box<dyn OptionChainProvider>,
    transport: Box<dyn OrderTransport>,
    workers: HashMap<String, WorkerHandle>,
    ticks_tx: mpsc::Sender<Tick>,
    ticks_rx: mpsc::Receiver<Tick>,
    intents_tx: mpsc::Sender<Intent>,
    intents_rx: mpsc::Receiver<Intent>,
}

impl TacticalBot {
    pub async fn new(
        config: SharedConfig,
        history: Box<dyn HistoricalBars>,
        chains: Box<dyn OptionChainProvider>,
        transport: Box<dyn OrderTransport>,
    ) -> Self {
        let cfg = config.read().await;
        info!("{}", "=".repeat(60));
        info!("Tactical trading bot starting up");
        info!(
            "Mode: {}",
            if cfg.paper_trade {
                "PAPER TRADING"
            } else {
                "LIVE TRADING"
            }
        );
        info!("Instruments: {}", cfg.instruments.join(", "));
        info!("{}", "=".repeat(60));
        let capacity = cfg.channel_capacity;
        drop(cfg);

        let (ticks_tx, ticks_rx) = mpsc::channel(capacity);
        let (intents_tx, intents_rx) = mpsc::channel(capacity);
        Self {
            config,
            history,
            chains,
            transport,
            workers: HashMap::new(),
            ticks_tx,
            ticks_rx,
            intents_tx,
            intents_rx,
        }
    }

    /// Feed handle for whatever produces ticks (live stream or replay).
    pub fn tick_sender(&self) -> mpsc::Sender<Tick> {
        self.ticks_tx.clone()
    }

    /// Per instrument: warm up from history, derive the prior-session zone
    /// and option sentiment, then spawn the worker and queue its session
    /// context. The opening price resolves from the first live tick.
    pub async fn bootstrap(&mut self) -> Result<()> {
        let cfg = self.config.read().await.clone();

        for instrument in &cfg.instruments {
            let bars = self.history.fetch_intraday(instrument, WARMUP_DAYS).await?;
            let zone = compute_hunter_zone(&bars)?;

            let chain = self.chains.fetch_chain(instrument).await?;
            let pcr = calculate_pcr(&chain);

            let mut engine = InstrumentEngine::new(instrument, &cfg);
            engine.seed_history(&bars);
            if !chain.is_empty() {
                engine.set_option_chain(chain);
            }

            let handle = spawn_worker(engine, cfg.channel_capacity, self.intents_tx.clone());
            handle
                .events
                .send(InstrumentEvent::SessionStart { zone, pcr })
                .await?;
            info!(
                instrument = %instrument,
                pcr,
                zone_high = zone.high,
                zone_low = zone.low,
                "instrument bootstrapped"
            );
            self.workers.insert(instrument.clone(), handle);
        }
        Ok(())
    }

    pub async fn run(&mut self) -> Result<()> {
        info!("Bot is now running. Press Ctrl+C to stop.");
        let mut bar_timer = tokio::time::interval(Duration::from_secs(1));
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    self.shutdown().await;
                    return Ok(());
                }
                _ = bar_timer.tick() => {
                    self.broadcast_bar_timer().await;
                }
                Some(tick) = self.ticks_rx.recv() => {
                    self.route_tick(tick).await;
                }
                Some(intent) = self.intents_rx.recv() => {
                    self.act_on(intent).await;
                }
            }
        }
    }

    /// Without this a stalled feed would hold the last window open and
    /// defer every bar-close exit until the next tick finally arrives.
    async fn broadcast_bar_timer(&self) {
        let now = Utc::now();
        if !is_market_hours(now) {
            return;
        }
        for handle in self.workers.values() {
            if let Err(e) = handle.events.send(InstrumentEvent::BarTimer(now)).await {
                error!(instrument = %handle.instrument, error = %e, "worker channel closed");
            }
        }
    }

    async fn route_tick(&self, tick: Tick) {
        if !is_market_hours(tick.timestamp) {
            debug!(instrument = %tick.instrument, "tick outside market hours");
            return;
        }
        match self.workers.get(&tick.instrument) {
            Some(handle) => {
                if let Err(e) = handle.events.send(InstrumentEvent::Tick(tick)).await {
                    error!(error = %e, "worker channel closed");
                }
            }
            None => warn!(instrument = %tick.instrument, "tick for unknown instrument"),
        }
    }

    async fn act_on(&mut self, intent: Intent) {
        let result = match &intent {
            Intent::Entry(entry) => self.transport.submit_entry(entry).await,
            Intent::Exit(exit) => self.transport.submit_exit(exit).await,
        };
        match result {
            Ok(fill) => debug!(
                order_id = fill.order_id,
                instrument = %fill.instrument,
                price = fill.price,
                "fill"
            ),
            Err(e) => error!(instrument = %intent.instrument(), error = %e, "order rejected"),
        }
    }

    async fn shutdown(&mut self) {
        info!("Shutting down");
        for handle in self.workers.values() {
            if let Err(e) = handle.events.send(InstrumentEvent::SessionEnd).await {
                warn!(instrument = %handle.instrument, error = %e, "session end not delivered");
            }
        }
        for (_, handle) in std::mem::take(&mut self.workers) {
            drop(handle.events);
            if let Err(e) = handle.join.await {
                error!(instrument = %handle.instrument, error = %e, "worker panicked");
            }
        }
        // Flatten exits the workers emitted on their way out.
        while let Ok(intent) = self.intents_rx.try_recv() {
            self.act_on(intent).await;
        }
    }
}
