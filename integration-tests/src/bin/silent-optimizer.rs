//! Stub optimizer that reads its config and exits without registering a report.

use std::path::PathBuf;

use anyhow::{Context, Result};
use integration_tests::init_optimizer_tracing;
use tracing::info;
use tuner_bridge::protocol::OptimizerConfig;

fn main() -> Result<()> {
    init_optimizer_tracing();

    let workspace = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .context("usage: silent-optimizer <workspace>")?;
    let config = OptimizerConfig::load(&workspace)?;

    info!(endpoint = %config.endpoint, "leaving without a report");
    Ok(())
}
