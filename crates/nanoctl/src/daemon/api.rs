use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use nanoctl_config::summary::{self, ChannelSummary, ProviderSummary};
use nanoctl_config::{ConfigError, ConfigGateway, FileConfigStore, GatewaySchema};
use nanoctl_supervisor::{GatewayStatus, ProcessState, Supervisor};
use serde::Serialize;
use serde_json::Value;
use tower_http::trace::TraceLayer;

use super::auth::{self, Credentials};
use super::cron::{self, CronSummary};

pub const RESTART_FLAG: &str = "_restartGateway";

pub type GatewayConfig = ConfigGateway<FileConfigStore, GatewaySchema>;

#[derive(Clone)]
pub struct AppState {
	pub supervisor: Arc<Supervisor>,
	pub config: Arc<GatewayConfig>,
	pub credentials: Arc<Credentials>,
	pub cron_dir: PathBuf,
}

pub fn router(state: AppState) -> Router {
	let protected = Router::new()
		.route("/api/config", get(get_config).put(put_config))
		.route("/api/status", get(status))
		.route("/api/logs", get(logs))
		.route("/api/gateway/start", post(start_gateway))
		.route("/api/gateway/stop", post(stop_gateway))
		.route("/api/gateway/restart", post(restart_gateway))
		.layer(middleware::from_fn_with_state(state.clone(), auth::require_auth));

	Router::new()
		.route("/health", get(health))
		.merge(protected)
		.layer(TraceLayer::new_for_http())
		.with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
	status: &'static str,
	gateway: ProcessState,
}

#[derive(Serialize)]
struct SaveResponse {
	ok: bool,
	restarting: bool,
}

#[derive(Serialize)]
struct ActionResponse {
	ok: bool,
}

#[derive(Serialize)]
struct StatusResponse {
	gateway: GatewayStatus,
	providers: BTreeMap<String, ProviderSummary>,
	channels: BTreeMap<String, ChannelSummary>,
	cron: CronSummary,
}

#[derive(Serialize)]
struct LogsResponse {
	lines: Vec<String>,
}

#[derive(Serialize)]
struct ErrorResponse {
	error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
	(status, Json(ErrorResponse { error: error.into() }))
}

impl From<ConfigError> for ErrorResponse {
	fn from(e: ConfigError) -> Self {
		ErrorResponse { error: e.to_string() }
	}
}

fn config_error(e: ConfigError) -> ApiError {
	let status = if e.is_validation() {
		StatusCode::BAD_REQUEST
	} else {
		tracing::error!(error = %e, "config operation failed");
		StatusCode::INTERNAL_SERVER_ERROR
	};
	(status, Json(e.into()))
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
	Json(HealthResponse {
		status: "ok",
		gateway: state.supervisor.state().await,
	})
}

async fn get_config(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
	state.config.read_for_display().map(Json).map_err(config_error)
}

async fn put_config(State(state): State<AppState>, body: Bytes) -> Result<Json<SaveResponse>, ApiError> {
	let mut submitted: Value =
		serde_json::from_slice(&body).map_err(|_| api_error(StatusCode::BAD_REQUEST, "Invalid JSON"))?;

	let restart = submitted
		.as_object_mut()
		.and_then(|map| map.remove(RESTART_FLAG))
		.and_then(|flag| flag.as_bool())
		.unwrap_or(false);

	state.config.apply_edit(&submitted).await.map_err(config_error)?;

	if restart {
		let supervisor = Arc::clone(&state.supervisor);
		tokio::spawn(async move { supervisor.restart().await });
	}
	Ok(Json(SaveResponse { ok: true, restarting: restart }))
}

async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
	let gateway = state.supervisor.status().await;
	let tree = state.config.load().unwrap_or_else(|e| {
		tracing::warn!(error = %e, "gateway config unavailable for status");
		Value::Object(Default::default())
	});

	Json(StatusResponse {
		gateway,
		providers: summary::providers(&tree),
		channels: summary::channels(&tree),
		cron: cron::list_jobs(&state.cron_dir),
	})
}

async fn logs(State(state): State<AppState>) -> Json<LogsResponse> {
	Json(LogsResponse {
		lines: state.supervisor.logs().snapshot().await,
	})
}

async fn start_gateway(State(state): State<AppState>) -> Json<ActionResponse> {
	let supervisor = Arc::clone(&state.supervisor);
	tokio::spawn(async move { supervisor.start().await });
	Json(ActionResponse { ok: true })
}

async fn stop_gateway(State(state): State<AppState>) -> Json<ActionResponse> {
	let supervisor = Arc::clone(&state.supervisor);
	tokio::spawn(async move { supervisor.stop().await });
	Json(ActionResponse { ok: true })
}

async fn restart_gateway(State(state): State<AppState>) -> Json<ActionResponse> {
	let supervisor = Arc::clone(&state.supervisor);
	tokio::spawn(async move { supervisor.restart().await });
	Json(ActionResponse { ok: true })
}
