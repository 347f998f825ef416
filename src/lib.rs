pub mod config;
pub mod core;
pub mod engine;
pub mod errors;
pub mod models;
pub mod options;
pub mod providers;
#[cfg(test)]
pub mod test_helpers;
