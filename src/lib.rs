pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::cli::LocalStorage;

pub use core::{
    etl::{ForecastEngine, RunSummary},
    pipeline::MilestonePipeline,
};
pub use utils::error::{ForecastError, Result};
