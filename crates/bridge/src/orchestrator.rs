use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task;
use tracing::{Instrument, debug, info, info_span, warn};
use tuner_core::{Report, Settings};

use crate::{
    Error,
    endpoint::Endpoint,
    estimator::CostEstimator,
    supervisor::{self, ProcessError},
    workspace,
};

/// Runs one optimization to completion.
///
/// Validates `settings`, starts the local endpoint, launches the external
/// optimizer against it, and returns the report the optimizer registered.
/// The endpoint is stopped before this returns, whatever the outcome.
///
/// When the optimizer fails after one of its requests failed, the request
/// failure is returned as [`Error::Handler`], since it is usually the cause.
///
/// # Errors
///
/// Returns an error if the settings are invalid, the endpoint or workspace
/// cannot be set up, the optimizer fails, or it exits without a report.
pub async fn optimize(settings: Settings) -> Result<Report, Error> {
    settings.validate()?;
    debug!("settings validated");

    let settings = Arc::new(settings);
    let estimator = Arc::new(Mutex::new(CostEstimator::new(Arc::clone(&settings))?));

    let span = info_span!("optimize", parameters = settings.parameters.len());
    async move {
        let mut endpoint = Endpoint::start(
            settings.endpoint,
            Arc::clone(&estimator),
            settings.evaluation_timeout,
        )?;
        debug!(address = %endpoint.address(), "endpoint running");

        let result = drive(&settings, &endpoint, &estimator).await;
        endpoint.shutdown().await;

        match &result {
            Ok(report) => info!(
                cost = report.cost,
                evaluations = report.evaluations,
                "optimization finished"
            ),
            Err(err) => warn!(error = %err, "optimization failed"),
        }
        result
    }
    .instrument(span)
    .await
}

async fn drive(
    settings: &Settings,
    endpoint: &Endpoint,
    estimator: &Arc<Mutex<CostEstimator>>,
) -> Result<Report, Error> {
    let workspace = workspace::prepare(settings.root_dir.as_deref()).await?;
    info!(workspace = %workspace.display(), endpoint = %endpoint.address(), "launching optimizer");

    if let Err(process) = supervisor::run(settings, &workspace, endpoint.address()).await {
        return Err(failure(endpoint, process));
    }

    let (report, attempts) = collect(Arc::clone(estimator)).await?;
    debug!(attempts, "optimizer exited cleanly");
    report.ok_or(Error::MissingReport)
}

/// Takes the registered report and the attempt count off the runtime's
/// worker threads, since a stray request may still hold the estimator.
async fn collect(estimator: Arc<Mutex<CostEstimator>>) -> Result<(Option<Report>, u64), Error> {
    task::spawn_blocking(move || {
        let mut estimator = estimator.lock();
        (estimator.take_report(), estimator.attempts())
    })
    .await
    .map_err(Error::Estimator)
}

/// Prefers the last request failure over the process failure it caused.
fn failure(endpoint: &Endpoint, process: ProcessError) -> Error {
    match endpoint.last_error() {
        Some(source) => Error::Handler { source, process },
        None => Error::Process(process),
    }
}
