//! CLI command implementations.

pub mod build;
pub mod check;

pub use build::{build_details, build_index, build_site};
pub use check::check_site;

use anyhow::{Context, Result};
use scriv_core::Config;
use std::path::Path;

fn load_config(config_path: &Path) -> Result<Config> {
    tracing::info!("Loading config from {:?}", config_path);
    Config::from_file(config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))
}
