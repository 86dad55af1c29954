//! HTTP submission API.
//!
//! Thin surface over the scheduler and the persistence mirror:
//! - `POST /jobs` validates and submits a job, returns 202 with its view
//! - `GET /jobs` / `GET /jobs/{id}` serve live state from the in-memory index
//! - `GET /store/jobs` / `GET /store/jobs/{id}` serve persisted terminal rows
//!
//! The id→job index lives here, not in the scheduler.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use crate::job::{registry, Job, JobResult};
use crate::scheduler::Scheduler;
use crate::store::{mirror_when_terminal, JobSnapshot, JobStore};

#[derive(Clone)]
pub struct ApiState {
    pub scheduler: Arc<Scheduler>,
    pub store: Arc<dyn JobStore>,
    pub jobs: Arc<RwLock<HashMap<String, Arc<Job>>>>,
    pub default_thread_demand: usize,
}

impl ApiState {
    pub fn new(
        scheduler: Arc<Scheduler>,
        store: Arc<dyn JobStore>,
        default_thread_demand: usize,
    ) -> Self {
        Self {
            scheduler,
            store,
            jobs: Arc::new(RwLock::new(HashMap::new())),
            default_thread_demand,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SubmitJobRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub priority: i32,
    #[serde(default)]
    pub thread_demand: usize,
    pub payload: Value,
}

#[derive(Debug, Serialize)]
pub struct JobView {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub priority: i32,
    pub thread_demand: usize,
    pub status: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResult>,
}

impl JobView {
    fn of(job: &Job) -> Self {
        Self {
            id: job.id.clone(),
            kind: job.kind.to_string(),
            priority: job.priority,
            thread_demand: job.thread_demand(),
            status: job.status().to_string(),
            created_at: job.created_at,
            started_at: job.started_at(),
            completed_at: job.completed_at(),
            result: job.result(),
        }
    }

    fn of_snapshot(snapshot: &JobSnapshot) -> Self {
        Self {
            id: snapshot.id.clone(),
            kind: snapshot.kind.clone(),
            priority: snapshot.priority,
            thread_demand: snapshot.thread_demand,
            status: snapshot.status.to_string(),
            created_at: snapshot.created_at,
            started_at: snapshot.started_at,
            completed_at: snapshot.completed_at,
            result: snapshot.result.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
        .into_response()
}

pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/jobs", post(submit_job_handler))
        .route("/jobs", get(list_jobs_handler))
        .route("/jobs/{id}", get(get_job_handler))
        .route("/store/jobs", get(list_store_jobs_handler))
        .route("/store/jobs/{id}", get(get_store_job_handler))
        .layer(cors)
        .with_state(state)
}

/// Bind and serve the API until the process exits.
pub async fn serve(addr: SocketAddr, state: ApiState) {
    let app = router(state);

    tracing::info!(addr = %addr, "Starting submission API");
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(addr = %addr, error = %e, "Failed to bind submission API");
            return;
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "Submission API failed");
    }
}

pub async fn submit_job_handler(
    State(state): State<ApiState>,
    Json(req): Json<SubmitJobRequest>,
) -> Response {
    let thread_demand = if req.thread_demand == 0 {
        state.default_thread_demand
    } else {
        req.thread_demand
    };

    let id = Uuid::new_v4().to_string();
    let job = match registry::build_job(id, &req.kind, req.priority, thread_demand, req.payload) {
        Ok(job) => Arc::new(job),
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };

    state
        .jobs
        .write()
        .await
        .insert(job.id.clone(), Arc::clone(&job));

    if let Err(e) = state.scheduler.submit(Arc::clone(&job)) {
        return error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string());
    }

    mirror_when_terminal(Arc::clone(&job), Arc::clone(&state.store));

    tracing::info!(job_id = %job.id, kind = %job.kind, priority = job.priority, "Job submitted");
    (StatusCode::ACCEPTED, Json(JobView::of(&job))).into_response()
}

pub async fn list_jobs_handler(State(state): State<ApiState>) -> Response {
    let jobs = state.jobs.read().await;
    let mut views: Vec<JobView> = jobs.values().map(|job| JobView::of(job)).collect();
    views.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    Json(views).into_response()
}

pub async fn get_job_handler(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    if let Some(job) = state.jobs.read().await.get(&id) {
        return Json(JobView::of(job)).into_response();
    }
    // Fall back to the persisted row for jobs this process no longer indexes.
    match state.store.get(&id) {
        Some(snapshot) => Json(JobView::of_snapshot(&snapshot)).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "job not found"),
    }
}

pub async fn list_store_jobs_handler(State(state): State<ApiState>) -> Response {
    let views: Vec<JobView> = state
        .store
        .all()
        .iter()
        .map(JobView::of_snapshot)
        .collect();
    Json(views).into_response()
}

pub async fn get_store_job_handler(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Response {
    match state.store.get(&id) {
        Some(snapshot) => Json(JobView::of_snapshot(&snapshot)).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "job not found"),
    }
}
