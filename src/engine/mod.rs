pub mod instrument;
pub mod intents;
pub mod state_machine;
pub mod worker;

pub use instrument::{BarOutcome, InstrumentEngine, TickOutcome};
pub use intents::{EntryIntent, ExitIntent, Intent};
pub use state_machine::TradeStateMachine;
pub use worker::{spawn_worker, InstrumentEvent, WorkerHandle};
