use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::core::day_type::HunterZone;
use crate::engine::instrument::{BarOutcome, InstrumentEngine};
use crate::engine::intents::Intent;
use crate::models::Tick;
use crate::options::StrikeEntry;

/// Events the bot routes to a single instrument's worker task.
#[derive(Debug, Clone)]
pub enum InstrumentEvent {
    Tick(Tick),
    /// Session context minus the opening price, which only exists once the
    /// first trade prints. The worker resolves it from the first tick.
    SessionStart { zone: HunterZone, pcr: f64 },
    /// Closes the in-progress bar when its window has elapsed on a quiet
    /// tape. Carries the clock so replay can drive it deterministically.
    BarTimer(DateTime<Utc>),
    SessionEnd,
    OptionChain(Vec<StrikeEntry>),
    IndexSync(bool),
}

pub struct WorkerHandle {
    pub instrument: String,
    pub events: mpsc::Sender<InstrumentEvent>,
    pub join: JoinHandle<()>,
}

/// One task per instrument: the engine is owned by the task, so all
/// per-instrument state is single-threaded and lock-free. Trade intents
/// flow out on the shared channel for the transport to act on.
pub fn spawn_worker(
    mut engine: InstrumentEngine,
    capacity: usize,
    intents: mpsc::Sender<Intent>,
) -> WorkerHandle {
    let (tx, mut rx) = mpsc::channel::<InstrumentEvent>(capacity);
    let instrument = engine.instrument().to_string();

    let join = tokio::spawn(async move {
        // Set by SessionStart, consumed by the first tick after it.
        let mut pending_session: Option<(HunterZone, f64)> = None;

        while let Some(event) = rx.recv().await {
            match event {
                InstrumentEvent::Tick(tick) => {
                    if let Some((zone, pcr)) = pending_session.take() {
                        engine.on_session_start(zone, tick.price, pcr);
                    }
                    match engine.on_tick(&tick) {
                        Ok(outcome) => {
                            if let Some(exit) = outcome.exit {
                                forward(&intents, Intent::Exit(exit)).await;
                            }
                            if let Some(bar) = outcome.bar {
                                forward_bar(&intents, bar).await;
                            }
                        }
                        Err(e) => {
                            warn!(instrument = %engine.instrument(), error = %e, "tick dropped");
                        }
                    }
                }
                InstrumentEvent::SessionStart { zone, pcr } => {
                    debug!(instrument = %engine.instrument(), pcr, "session context queued");
                    pending_session = Some((zone, pcr));
                }
                InstrumentEvent::BarTimer(now) => match engine.on_timer(now) {
                    Ok(Some(bar)) => forward_bar(&intents, bar).await,
                    Ok(None) => {}
                    Err(e) => {
                        warn!(instrument = %engine.instrument(), error = %e, "timer bar rejected");
                    }
                },
                InstrumentEvent::SessionEnd => {
                    pending_session = None;
                    match engine.on_session_end(Utc::now()) {
                        Ok(Some(exit)) => forward(&intents, Intent::Exit(exit)).await,
                        Ok(None) => {}
                        Err(e) => {
                            error!(instrument = %engine.instrument(), error = %e, "session end");
                        }
                    }
                }
                InstrumentEvent::OptionChain(chain) => {
                    engine.set_option_chain(chain);
                }
                InstrumentEvent::IndexSync(index_sync) => {
                    engine.set_index_sync(index_sync);
                }
            }
        }
        debug!(instrument = %engine.instrument(), "worker stopped");
    });

    WorkerHandle {
        instrument,
        events: tx,
        join,
    }
}

async fn forward(intents: &mpsc::Sender<Intent>, intent: Intent) {
    if let Err(e) = intents.send(intent).await {
        error!(error = %e, "intent channel closed");
    }
}

async fn forward_bar(intents: &mpsc::Sender<Intent>, bar: BarOutcome) {
    if let Some(exit) = bar.exit {
        forward(intents, Intent::Exit(exit)).await;
    }
    if let Some(entry) = bar.entry {
        forward(intents, Intent::Entry(entry)).await;
    }
}
