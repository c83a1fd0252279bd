pub mod arbitrage;
pub mod blockchain;
pub mod bot;
pub mod config;
pub mod dex;
pub mod errors;
pub mod relay;
pub mod types;

#[cfg(test)]
mod testing;

pub use config::{ArbitrageParams, Config};
pub use errors::{ArbitrageError, SkipReason};
pub use types::*;
