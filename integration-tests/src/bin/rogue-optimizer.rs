//! Stub optimizer that proposes a parameter the host never declared.
//!
//! The endpoint rejects the request, and the optimizer exits with an error.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use integration_tests::{OptimizerClient, init_optimizer_tracing};
use tuner_bridge::protocol::OptimizerConfig;
use tuner_core::ParameterValue;

#[tokio::main]
async fn main() -> Result<()> {
    init_optimizer_tracing();

    let workspace = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .context("usage: rogue-optimizer <workspace>")?;
    let config = OptimizerConfig::load(&workspace)?;
    let client = OptimizerClient::from_config(&config);

    let response = client
        .estimate_cost(vec![ParameterValue::new("w", 1)])
        .await
        .context("estimate cost for undeclared parameter 'w'")?;

    bail!("endpoint accepted an undeclared parameter: {response:?}")
}
