use thiserror::Error;

/// Engine-local error kinds. Every variant is scoped to a single
/// instrument's worker; none of them halt processing for other instruments.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A bar arrived for a window that already closed. The bar is rejected
    /// and the history it would have corrupted stays as it was.
    #[error("data gap for {instrument}: {detail}")]
    DataGap { instrument: String, detail: String },

    /// DayType (or anything derived from it) was requested before the
    /// session context was resolved. The state machine stays Idle.
    #[error("session context not resolved for {instrument}")]
    StaleSessionContext { instrument: String },

    /// A lookback computation was asked for with fewer bars than it needs.
    /// Treated as "no signal", never as a zero or default direction.
    #[error("insufficient history: need {needed} bars, have {have}")]
    InsufficientHistory { needed: usize, have: usize },

    /// An entry was attempted while a position is already open for the
    /// instrument. Fatal to that entry attempt only.
    #[error("invariant violation for {instrument}: {detail}")]
    InvariantViolation { instrument: String, detail: String },
}
