pub mod aggregator;
pub mod day_type;
pub mod evwma;
pub mod probability;
pub mod score;
pub mod session;
pub mod stop_loss;
pub mod vpa;
