//! Shared pieces for driving the bridge from the optimizer side.
//!
//! The stub optimizers in `src/bin` are built on [`OptimizerClient`], and the
//! end-to-end tests launch them through `tuner_bridge::optimize`.

use reqwest::StatusCode;
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use tuner_bridge::protocol::{
    ESTIMATE_COST_PATH, ErrorResponse, EstimateCostRequest, EstimateCostResponse,
    OptimizerConfig, ParameterSpec, REGISTER_REPORT_PATH, RegisterReportRequest,
    RegisterReportResponse,
};
use tuner_core::{ParameterValue, Report};

/// File the exhaustive optimizer writes its best-cost trace to.
pub const TRACE_FILE_NAME: &str = "trace.json";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed")]
    Transport(#[from] reqwest::Error),

    #[error("endpoint answered {status}: {message}")]
    Rejected { status: StatusCode, message: String },
}

/// HTTP client for the bridge endpoint, as an external optimizer uses it.
#[derive(Debug, Clone)]
pub struct OptimizerClient {
    http: reqwest::Client,
    base_url: String,
}

impl OptimizerClient {
    /// Creates a client for an endpoint given as `host:port`.
    #[must_use]
    pub fn new(endpoint: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: format!("http://{endpoint}"),
        }
    }

    #[must_use]
    pub fn from_config(config: &OptimizerConfig) -> Self {
        Self::new(&config.endpoint)
    }

    /// Asks the host to evaluate one parameter combination.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the endpoint rejects it.
    pub async fn estimate_cost(
        &self,
        parameter_values: Vec<ParameterValue>,
    ) -> Result<EstimateCostResponse, ClientError> {
        let request = self
            .http
            .get(self.url(ESTIMATE_COST_PATH))
            .json(&EstimateCostRequest { parameter_values });
        send(request).await
    }

    /// Hands the final report to the host.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the endpoint rejects it.
    pub async fn register_report(&self, report: Option<Report>) -> Result<(), ClientError> {
        let request = self
            .http
            .post(self.url(REGISTER_REPORT_PATH))
            .json(&RegisterReportRequest { report });
        let RegisterReportResponse {} = send(request).await?;
        Ok(())
    }

    /// Sends an arbitrary body with an arbitrary verb, for protocol misuse tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the endpoint rejects it.
    pub async fn raw<B: Serialize>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: &B,
    ) -> Result<serde_json::Value, ClientError> {
        send(self.http.request(method, self.url(path)).json(body)).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }
}

async fn send<T: DeserializeOwned>(request: reqwest::RequestBuilder) -> Result<T, ClientError> {
    let response = request.send().await?;
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    let body = response.text().await?;
    let message = serde_json::from_str::<ErrorResponse>(&body).map_or(body, |err| err.error);
    Err(ClientError::Rejected { status, message })
}

/// Every integer point inside the parameter bounds, last parameter varying fastest.
#[must_use]
pub fn grid(parameters: &[ParameterSpec]) -> Vec<Vec<ParameterValue>> {
    parameters.iter().fold(vec![Vec::new()], |points, param| {
        points
            .into_iter()
            .flat_map(|point| {
                (param.bound.from..=param.bound.to).map(move |value| {
                    let mut next = point.clone();
                    next.push(ParameterValue::new(param.name.clone(), value));
                    next
                })
            })
            .collect()
    })
}

/// Installs a stderr log subscriber for the stub optimizers.
pub fn init_optimizer_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Installs a test-captured log subscriber; later calls are no-ops.
pub fn init_test_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}
