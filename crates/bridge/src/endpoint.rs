//! Local HTTP endpoint the external optimizer calls back on.
//!
//! Every request passes through one handling wrapper that opens a tracing
//! span for the request, dispatches to the route handler, and on failure
//! records the error as the endpoint's last error before answering with the
//! error's status. The orchestrator polls [`Endpoint::last_error`] after the
//! optimizer exits, since a failed request is usually the real reason an
//! optimizer gave up.
//!
//! Estimator calls run on the blocking pool behind a single mutex, so at most
//! one estimate or registration executes at a time no matter how many
//! requests arrive concurrently.

mod error;

pub use error::{BindError, HandlerError};

use std::{net::SocketAddr, sync::Arc, time::Duration};

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use tokio::{
    sync::oneshot,
    task::{self, JoinHandle},
};
use tracing::{Instrument, Span, error, info, info_span, warn};
use tuner_core::EvalContext;
use warp::{
    Filter, Rejection, Reply,
    http::{Method, StatusCode},
    hyper::body::Bytes,
    path::FullPath,
    reply::Response,
};

use crate::{
    error::error_chain,
    estimator::CostEstimator,
    protocol::{
        ESTIMATE_COST_PATH, ErrorResponse, EstimateCostRequest, EstimateCostResponse,
        REGISTER_REPORT_PATH, RegisterReportRequest, RegisterReportResponse,
    },
};

/// A running endpoint.
///
/// Dropping the endpoint signals the server to stop without waiting for it;
/// call [`Endpoint::shutdown`] to wait.
pub struct Endpoint {
    address: SocketAddr,
    last_error: LastError,
    shutdown: Option<oneshot::Sender<()>>,
    server: Option<JoinHandle<()>>,
}

impl Endpoint {
    /// Binds `address` and starts serving in a background task.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub fn start(
        address: SocketAddr,
        estimator: Arc<Mutex<CostEstimator>>,
        evaluation_timeout: Option<Duration>,
    ) -> Result<Self, BindError> {
        let last_error = LastError::default();
        let handlers = Handlers {
            estimator,
            last_error: last_error.clone(),
            evaluation_timeout,
        };

        let (shutdown, signal) = oneshot::channel::<()>();
        let (bound, server) = warp::serve(routes(handlers))
            .try_bind_with_graceful_shutdown(address, async move {
                signal.await.ok();
            })
            .map_err(|source| BindError { address, source })?;

        let server = tokio::spawn(server);
        info!(address = %bound, "endpoint listening");

        Ok(Self {
            address: bound,
            last_error,
            shutdown: Some(shutdown),
            server: Some(server),
        })
    }

    /// The address the server is bound to.
    #[must_use]
    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// The most recent request handling failure, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<Arc<HandlerError>> {
        self.last_error.get()
    }

    /// Stops the server and waits for it to finish.
    ///
    /// Safe to call more than once. Failures are logged, not returned.
    pub async fn shutdown(&mut self) {
        let Some(server) = self.server.take() else {
            return;
        };

        if let Some(signal) = self.shutdown.take() {
            if signal.send(()).is_err() {
                warn!(address = %self.address, "endpoint server already stopped");
            }
        }

        match server.await {
            Ok(()) => info!(address = %self.address, "endpoint stopped"),
            Err(err) => error!(address = %self.address, error = %err, "endpoint shutdown failed"),
        }
    }
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        if let Some(signal) = self.shutdown.take() {
            signal.send(()).ok();
        }
    }
}

/// Thread-safe cell holding the most recent handler failure.
#[derive(Clone, Default)]
struct LastError(Arc<Mutex<Option<Arc<HandlerError>>>>);

impl LastError {
    fn record(&self, err: HandlerError) {
        *self.0.lock() = Some(Arc::new(err));
    }

    fn get(&self) -> Option<Arc<HandlerError>> {
        self.0.lock().clone()
    }
}

#[derive(Debug, Clone, Copy)]
enum Route {
    EstimateCost,
    RegisterReport,
}

impl Route {
    fn path(self) -> &'static str {
        match self {
            Route::EstimateCost => ESTIMATE_COST_PATH,
            Route::RegisterReport => REGISTER_REPORT_PATH,
        }
    }

    fn method(self) -> Method {
        match self {
            Route::EstimateCost => Method::GET,
            Route::RegisterReport => Method::POST,
        }
    }
}

/// Everything the wrapper needs to know about an inbound request.
struct Request {
    method: Method,
    path: FullPath,
    remote: Option<SocketAddr>,
    body: Bytes,
}

impl Request {
    /// Checks the verb and hands back the body.
    fn accept(self, route: Route) -> Result<Bytes, HandlerError> {
        if self.method != route.method() {
            return Err(HandlerError::MethodNotAllowed {
                path: route.path(),
                method: self.method.to_string(),
            });
        }
        Ok(self.body)
    }
}

/// Cancels the evaluation context if the request is abandoned mid-flight.
struct CancelOnDrop(EvalContext);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

#[derive(Clone)]
struct Handlers {
    estimator: Arc<Mutex<CostEstimator>>,
    last_error: LastError,
    evaluation_timeout: Option<Duration>,
}

impl Handlers {
    async fn handle(self, route: Route, request: Request) -> Response {
        let span = info_span!(
            "request",
            url = %request.path.as_str(),
            method = %request.method,
            remote_addr = ?request.remote,
        );
        self.dispatch(route, request).instrument(span).await
    }

    async fn dispatch(self, route: Route, request: Request) -> Response {
        info!("request handling started");

        let result = match route {
            Route::EstimateCost => self
                .estimate_cost(request)
                .await
                .map(|response| warp::reply::json(&response).into_response()),
            Route::RegisterReport => self
                .register_report(request)
                .await
                .map(|response| warp::reply::json(&response).into_response()),
        };

        match result {
            Ok(response) => {
                info!(status = %StatusCode::OK, "request handling finished");
                response
            }
            Err(err) => {
                let status = err.status();
                let message = error_chain(&err);
                error!(%status, error = %message, "request handling failed");
                self.last_error.record(err);

                let body = warp::reply::json(&ErrorResponse { error: message });
                warp::reply::with_status(body, status).into_response()
            }
        }
    }

    async fn estimate_cost(&self, request: Request) -> Result<EstimateCostResponse, HandlerError> {
        let route = Route::EstimateCost;
        let request: EstimateCostRequest = decode(route, &request.accept(route)?)?;

        let ctx = EvalContext::new();
        let _cancel = CancelOnDrop(ctx.clone());

        let estimator = Arc::clone(&self.estimator);
        let timeout = self.evaluation_timeout;
        let span = Span::current();
        let estimate = task::spawn_blocking(move || {
            let _entered = span.enter();
            let mut estimator = estimator.lock();
            // The deadline starts once this request holds the estimator.
            let ctx = match timeout {
                Some(timeout) => ctx.with_timeout_from_now(timeout),
                None => ctx,
            };
            estimator.estimate_cost(&request.parameter_values, &ctx)
        })
        .await
        .map_err(HandlerError::Task)??;

        Ok(estimate.into())
    }

    async fn register_report(
        &self,
        request: Request,
    ) -> Result<RegisterReportResponse, HandlerError> {
        let route = Route::RegisterReport;
        let request: RegisterReportRequest = decode(route, &request.accept(route)?)?;

        let estimator = Arc::clone(&self.estimator);
        let span = Span::current();
        task::spawn_blocking(move || {
            let _entered = span.enter();
            estimator.lock().register_report(request.report)
        })
        .await
        .map_err(HandlerError::Task)??;

        Ok(RegisterReportResponse {})
    }
}

fn decode<T: DeserializeOwned>(route: Route, body: &[u8]) -> Result<T, HandlerError> {
    serde_json::from_slice(body).map_err(|source| HandlerError::Decode {
        path: route.path(),
        source,
    })
}

fn routes(handlers: Handlers) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let serve = move |route: Route| {
        let handlers = handlers.clone();
        warp::path(route.path())
            .and(warp::path::end())
            .and(request())
            .then(move |request: Request| handlers.clone().handle(route, request))
    };

    serve(Route::EstimateCost)
        .or(serve(Route::RegisterReport))
        .unify()
}

fn request() -> impl Filter<Extract = (Request,), Error = Rejection> + Clone {
    warp::method()
        .and(warp::path::full())
        .and(warp::addr::remote())
        .and(warp::body::bytes())
        .map(|method, path, remote, body| Request {
            method,
            path,
            remote,
            body,
        })
}
