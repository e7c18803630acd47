//! Wire types shared by the local endpoint and the external optimizer.
//!
//! Requests and responses travel as JSON over HTTP:
//!
//! - `GET /estimate_cost` with [`EstimateCostRequest`], answered by [`EstimateCostResponse`]
//! - `POST /register_report` with [`RegisterReportRequest`], answered by [`RegisterReportResponse`]
//!
//! Failed requests are answered by [`ErrorResponse`]. Before launch the
//! bridge writes an [`OptimizerConfig`] to [`CONFIG_FILE_NAME`] inside the
//! workspace directory passed to the optimizer.

use std::{
    io,
    net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tuner_core::{Bound, Cost, InitStrategy, ParameterValue, Report, Settings};

/// File name of the optimizer config inside the workspace.
pub const CONFIG_FILE_NAME: &str = "settings.json";

/// Path of the cost estimation route.
pub const ESTIMATE_COST_PATH: &str = "estimate_cost";

/// Path of the report registration route.
pub const REGISTER_REPORT_PATH: &str = "register_report";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstimateCostRequest {
    pub parameter_values: Vec<ParameterValue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EstimateCostResponse {
    pub cost: Cost,
    /// Authoritative infeasibility flag; `cost` then holds the configured sentinel.
    pub invalid_parameter_combination: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterReportRequest {
    /// `null` is accepted on the wire and rejected by the registry.
    pub report: Option<Report>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterReportResponse {}

/// Body sent with every non-success status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// A parameter as the optimizer sees it: name and bound, no mutator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    pub bound: Bound,
}

/// Config artifact read by the external optimizer at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// `host:port` the optimizer calls back on.
    pub endpoint: String,
    pub parameters: Vec<ParameterSpec>,
    pub max_evaluations: u32,
    pub max_iterations: u32,
    pub skip_invalid_parameter_combination_on_plots: bool,
    pub init_strategy: InitStrategy,
}

/// Errors from [`OptimizerConfig::load`].
#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl OptimizerConfig {
    /// Builds the config for an endpoint listening on `endpoint`.
    ///
    /// A wildcard bind address is advertised as loopback, since the optimizer
    /// runs on the same host.
    #[must_use]
    pub fn new(settings: &Settings, endpoint: SocketAddr) -> Self {
        Self {
            endpoint: advertised(endpoint).to_string(),
            parameters: settings
                .parameters
                .iter()
                .map(|param| ParameterSpec {
                    name: param.name.clone(),
                    bound: param.bound,
                })
                .collect(),
            max_evaluations: settings.max_evaluations,
            max_iterations: settings.max_iterations,
            skip_invalid_parameter_combination_on_plots: settings
                .skip_invalid_parameter_combination_on_plots,
            init_strategy: settings.init_strategy,
        }
    }

    /// Location of the config inside `workspace`.
    #[must_use]
    pub fn path(workspace: &Path) -> PathBuf {
        workspace.join(CONFIG_FILE_NAME)
    }

    /// Reads the config from `workspace`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, unreadable, or not a valid config.
    pub fn load(workspace: &Path) -> Result<Self, ConfigFileError> {
        let path = Self::path(workspace);
        let data = std::fs::read(&path).map_err(|source| ConfigFileError::Read {
            path: path.clone(),
            source,
        })?;
        serde_json::from_slice(&data).map_err(|source| ConfigFileError::Parse { path, source })
    }
}

fn advertised(addr: SocketAddr) -> SocketAddr {
    match addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), addr.port())
        }
        IpAddr::V6(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), addr.port())
        }
        _ => addr,
    }
}
