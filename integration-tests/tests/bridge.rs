use std::{
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicI64, AtomicU64, Ordering},
    },
};

use approx::assert_relative_eq;
use integration_tests::{ClientError, OptimizerClient, TRACE_FILE_NAME, init_test_tracing};
use parking_lot::Mutex;
use reqwest::{Method, StatusCode};
use serde_json::json;
use tempfile::TempDir;
use tuner_bridge::{
    CostEstimator, Endpoint, Error, EstimateError, HandlerError, ProcessError, optimize,
};
use tuner_core::{
    Bound, Cost, CostError, EvalContext, ParameterDescription, ParameterValue, Report, Settings,
};

/// Host configuration the optimizer tunes.
#[derive(Default)]
struct Host {
    x: AtomicI64,
    y: AtomicI64,
    evaluations: AtomicU64,
}

impl Host {
    fn xy(&self) -> (i64, i64) {
        self.evaluations.fetch_add(1, Ordering::SeqCst);
        (self.x.load(Ordering::SeqCst), self.y.load(Ordering::SeqCst))
    }
}

fn stub(name: &str) -> PathBuf {
    match name {
        "exhaustive" => env!("CARGO_BIN_EXE_exhaustive-optimizer").into(),
        "silent" => env!("CARGO_BIN_EXE_silent-optimizer").into(),
        "rogue" => env!("CARGO_BIN_EXE_rogue-optimizer").into(),
        _ => panic!("unknown stub optimizer {name}"),
    }
}

/// Settings over `x, y ∈ [0, 10]` with invalid cost 10 and the given cost.
fn settings<F>(host: &Arc<Host>, root: &Path, executable: PathBuf, cost: F) -> Settings
where
    F: Fn(i64, i64) -> Result<Cost, CostError> + Send + Sync + 'static,
{
    let (x, y, eval) = (Arc::clone(host), Arc::clone(host), Arc::clone(host));
    Settings {
        max_evaluations: 121,
        invalid_parameter_combination_cost: 10.0,
        root_dir: Some(root.to_path_buf()),
        executable,
        ..Settings::new(
            vec![
                ParameterDescription::new("x", Bound::new(0, 10), move |v| {
                    x.x.store(v, Ordering::SeqCst);
                }),
                ParameterDescription::new("y", Bound::new(0, 10), move |v| {
                    y.y.store(v, Ordering::SeqCst);
                }),
            ],
            move |_: &EvalContext| {
                let (x, y) = eval.xy();
                cost(x, y)
            },
        )
    }
}

#[allow(clippy::cast_precision_loss)]
fn neg_product(x: i64, y: i64) -> Result<Cost, CostError> {
    Ok(-(x * y) as f64)
}

fn read_trace(root: &Path) -> Vec<Cost> {
    let data = std::fs::read(root.join(TRACE_FILE_NAME)).expect("trace should exist");
    serde_json::from_slice(&data).expect("trace should be JSON")
}

fn assert_optimum(report: &Report) {
    assert_relative_eq!(report.cost, -100.0);
    assert_eq!(
        report.optimum,
        [ParameterValue::new("x", 10), ParameterValue::new("y", 10)]
    );
    assert_eq!(report.optimum_value("x"), Some(10));
    assert_eq!(report.optimum_value("y"), Some(10));
}

#[tokio::test]
async fn exhaustive_run_finds_grid_optimum() {
    init_test_tracing();
    let root = TempDir::new().expect("temp dir");
    let host = Arc::new(Host::default());

    let report = optimize(settings(&host, root.path(), stub("exhaustive"), neg_product))
        .await
        .expect("optimization should succeed");

    assert_optimum(&report);
    assert_eq!(report.evaluations, 121);
    assert_eq!(host.evaluations.load(Ordering::SeqCst), 121);

    let trace = read_trace(root.path());
    assert_eq!(trace.len(), 121);
    assert!(trace.windows(2).all(|pair| pair[1] <= pair[0]));
    assert_relative_eq!(trace[120], -100.0);
}

#[tokio::test]
async fn infeasible_region_is_skipped() {
    init_test_tracing();
    let root = TempDir::new().expect("temp dir");
    let host = Arc::new(Host::default());
    let infeasible = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&infeasible);

    let report = optimize(settings(&host, root.path(), stub("exhaustive"), move |x, y| {
        if x < y {
            counter.fetch_add(1, Ordering::SeqCst);
            return Err(CostError::InvalidParameterCombination);
        }
        neg_product(x, y)
    }))
    .await
    .expect("optimization should succeed");

    assert_optimum(&report);
    assert_eq!(report.evaluations, 121);
    assert_eq!(infeasible.load(Ordering::SeqCst), 55);

    let trace = read_trace(root.path());
    assert_eq!(trace.len(), 121 - 55);
    assert!(trace.iter().all(|&cost| cost < 10.0));
    assert!(trace.windows(2).all(|pair| pair[1] <= pair[0]));
}

#[tokio::test]
async fn evaluation_budget_is_respected() {
    init_test_tracing();
    let root = TempDir::new().expect("temp dir");
    let host = Arc::new(Host::default());
    let settings = Settings {
        max_evaluations: 12,
        ..settings(&host, root.path(), stub("exhaustive"), neg_product)
    };

    let report = optimize(settings).await.expect("optimization should succeed");

    // Row-major walk: x = 0 for 11 points, then (1, 0).
    assert_eq!(report.evaluations, 12);
    assert_relative_eq!(report.cost, 0.0);
    assert_eq!(host.evaluations.load(Ordering::SeqCst), 12);
}

#[tokio::test]
async fn clean_exit_without_report_is_missing_report() {
    init_test_tracing();
    let root = TempDir::new().expect("temp dir");
    let host = Arc::new(Host::default());

    let err = optimize(settings(&host, root.path(), stub("silent"), neg_product))
        .await
        .expect_err("no report was registered");

    assert!(matches!(err, Error::MissingReport));
    assert_eq!(host.evaluations.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn request_error_is_preferred_over_exit_status() {
    init_test_tracing();
    let root = TempDir::new().expect("temp dir");
    let host = Arc::new(Host::default());

    let err = optimize(settings(&host, root.path(), stub("rogue"), neg_product))
        .await
        .expect_err("rogue optimizer should fail");

    let Error::Handler { source, process } = &err else {
        panic!("unexpected error: {err:?}");
    };
    assert!(matches!(
        source.as_ref(),
        HandlerError::Estimate(EstimateError::UnknownParameter(unknown)) if unknown.name == "w"
    ));
    assert!(matches!(
        process,
        ProcessError::Exit { status, .. } if status.code() == Some(1)
    ));
    assert_eq!(host.evaluations.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn misconfigured_invalid_cost_ends_the_run() {
    init_test_tracing();
    let root = TempDir::new().expect("temp dir");
    let host = Arc::new(Host::default());

    let err = optimize(settings(&host, root.path(), stub("exhaustive"), |_, _| Ok(50.0)))
        .await
        .expect_err("real cost above the sentinel should fail");

    let Error::Handler { source, .. } = &err else {
        panic!("unexpected error: {err:?}");
    };
    assert!(matches!(
        source.as_ref(),
        HandlerError::Estimate(EstimateError::MisconfiguredInvalidCost { .. })
    ));
}

#[tokio::test]
async fn client_sees_endpoint_rejections() {
    init_test_tracing();
    let root = TempDir::new().expect("temp dir");
    let host = Arc::new(Host::default());
    let settings = settings(&host, root.path(), stub("silent"), neg_product);
    let estimator = CostEstimator::new(Arc::new(settings)).expect("cost function is set");
    let estimator = Arc::new(Mutex::new(estimator));

    let mut endpoint = Endpoint::start(
        "127.0.0.1:0".parse().expect("valid address"),
        Arc::clone(&estimator),
        None,
    )
    .expect("should bind");
    let client = OptimizerClient::new(&endpoint.address().to_string());

    let response = client
        .estimate_cost(vec![ParameterValue::new("x", 4), ParameterValue::new("y", 5)])
        .await
        .expect("estimate should succeed");
    assert_relative_eq!(response.cost, -20.0);

    let err = client
        .raw(Method::POST, "estimate_cost", &json!({"parameter_values": []}))
        .await
        .expect_err("wrong verb");
    assert!(matches!(
        err,
        ClientError::Rejected { status: StatusCode::METHOD_NOT_ALLOWED, .. }
    ));

    let report = Report {
        cost: -20.0,
        optimum: vec![ParameterValue::new("x", 4), ParameterValue::new("y", 5)],
        iterations: 1,
        evaluations: 1,
        fast_evaluations: 0,
    };
    client
        .register_report(Some(report.clone()))
        .await
        .expect("first registration should succeed");
    let err = client
        .register_report(Some(report.clone()))
        .await
        .expect_err("second registration should fail");
    let ClientError::Rejected { status, message } = &err else {
        panic!("unexpected error: {err:?}");
    };
    assert_eq!(*status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(message, "register report: report has already been registered");

    endpoint.shutdown().await;
    assert_eq!(estimator.lock().report(), Some(&report));
    assert_eq!(estimator.lock().attempts(), 1);
}
