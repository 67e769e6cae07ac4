//! HTTP surface over `ProcessService`.
//!
//! OS work is blocking, so every handler hops onto the blocking pool. Reads
//! are bounded by `snapshot.timeout_ms`; kill and signal are not, since a
//! delivery cannot be taken back once started.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use log::{debug, warn};
use serde::Deserialize;
use serde_json::json;

use crate::error::{Error, Result};
use crate::query::{ListParams, QuerySpec};
use crate::service::ProcessService;
use crate::types::Pid;

pub fn router(service: ProcessService) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/process", get(list))
        .route("/process/tree", get(tree))
        .route("/process/detail", get(detail))
        .route("/process/kill", post(kill))
        .route("/process/signal", post(signal))
        .with_state(service)
}

pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            err if err.is_permission_denied() => StatusCode::FORBIDDEN,
            Error::Collection(_) | Error::Os { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            warn!("[api] {}", self.0);
        } else {
            debug!("[api] {}", self.0);
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

async fn blocking<T, F>(service: ProcessService, bounded: bool, f: F) -> ApiResult<T>
where
    F: FnOnce(&ProcessService) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let limit = if bounded {
        service.snapshot_config().timeout()
    } else {
        None
    };
    let task = tokio::task::spawn_blocking(move || f(&service));

    let joined = match limit {
        Some(limit) => tokio::time::timeout(limit, task)
            .await
            .map_err(|_| Error::Collection(format!("timed out after {limit:?}")))?,
        None => task.await,
    };
    let result = joined.map_err(|err| Error::Collection(format!("collection task failed: {err}")))?;
    Ok(result?)
}

async fn healthz() -> impl IntoResponse {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

async fn list(
    State(service): State<ProcessService>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<impl IntoResponse> {
    let spec = QuerySpec::from(ListParams::from_pairs(pairs));
    let page = blocking(service, true, move |svc| svc.list(&spec)).await?;
    Ok(Json(page))
}

async fn tree(State(service): State<ProcessService>) -> ApiResult<impl IntoResponse> {
    let roots = blocking(service, true, |svc| svc.tree()).await?;
    Ok(Json(roots))
}

#[derive(Debug, Deserialize)]
struct DetailParams {
    pid: Option<String>,
}

async fn detail(
    State(service): State<ProcessService>,
    Query(params): Query<DetailParams>,
) -> ApiResult<impl IntoResponse> {
    let pid = parse_pid(params.pid.as_deref())?;
    let detail = blocking(service, true, move |svc| svc.detail(pid)).await?;
    Ok(Json(detail))
}

#[derive(Debug, Deserialize)]
struct KillRequest {
    pid: Option<Pid>,
}

async fn kill(
    State(service): State<ProcessService>,
    payload: std::result::Result<Json<KillRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = payload.map_err(bad_body)?;
    let pid = req.pid.ok_or_else(|| Error::validation("pid is required"))?;
    blocking(service, false, move |svc| svc.kill(pid)).await?;
    Ok(Json(json!({ "status": "ok" })))
}

#[derive(Debug, Deserialize)]
struct SignalRequest {
    pid: Option<Pid>,
    signal: Option<String>,
}

async fn signal(
    State(service): State<ProcessService>,
    payload: std::result::Result<Json<SignalRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = payload.map_err(bad_body)?;
    let pid = req.pid.ok_or_else(|| Error::validation("pid is required"))?;
    let name = req
        .signal
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::validation("signal is required"))?;
    blocking(service, false, move |svc| svc.signal(pid, &name)).await?;
    Ok(Json(json!({ "status": "ok" })))
}

fn parse_pid(raw: Option<&str>) -> Result<Pid> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::validation("pid is required"))?;
    raw.parse::<Pid>()
        .ok()
        .filter(|pid| *pid > 0)
        .ok_or_else(|| Error::validation(format!("invalid pid: {raw}")))
}

fn bad_body(rejection: JsonRejection) -> ApiError {
    Error::validation(rejection.body_text()).into()
}
