//! Stub optimizer that walks the whole integer grid and registers the best point.
//!
//! Stops early once `max_evaluations` points have been tried. Writes the best
//! cost seen after each feasible evaluation to the trace file in the workspace.

use std::path::PathBuf;

use anyhow::{Context, Result};
use integration_tests::{OptimizerClient, TRACE_FILE_NAME, grid, init_optimizer_tracing};
use tracing::{debug, info};
use tuner_bridge::protocol::OptimizerConfig;
use tuner_core::{Cost, ParameterValue, Report};

#[tokio::main]
async fn main() -> Result<()> {
    init_optimizer_tracing();

    let workspace = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .context("usage: exhaustive-optimizer <workspace>")?;
    let config = OptimizerConfig::load(&workspace)?;
    let client = OptimizerClient::from_config(&config);

    let mut best: Option<(Cost, Vec<ParameterValue>)> = None;
    let mut trace = Vec::new();
    let mut evaluations = 0_u64;

    for point in grid(&config.parameters)
        .into_iter()
        .take(config.max_evaluations as usize)
    {
        let response = client.estimate_cost(point.clone()).await?;
        evaluations += 1;

        if response.invalid_parameter_combination {
            debug!(?point, "skipping infeasible point");
            continue;
        }

        if best.as_ref().is_none_or(|(cost, _)| response.cost < *cost) {
            best = Some((response.cost, point));
        }
        if let Some((cost, _)) = &best {
            trace.push(*cost);
        }
    }

    let trace_path = workspace.join(TRACE_FILE_NAME);
    std::fs::write(&trace_path, serde_json::to_vec(&trace)?)
        .with_context(|| format!("failed to write {}", trace_path.display()))?;

    let (cost, optimum) = best.context("no feasible point found")?;
    info!(cost, evaluations, "registering best point");
    client
        .register_report(Some(Report {
            cost,
            optimum,
            iterations: 1,
            evaluations,
            fast_evaluations: 0,
        }))
        .await?;

    Ok(())
}
