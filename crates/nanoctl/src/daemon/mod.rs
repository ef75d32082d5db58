pub mod api;
pub mod auth;
pub mod cron;

use std::net::SocketAddr;
use std::sync::Arc;

use nanoctl_config::{summary, ConfigGateway, FileConfigStore, GatewaySchema};
use nanoctl_supervisor::Supervisor;
use owo_colors::OwoColorize;
use tracing_subscriber::EnvFilter;

use crate::settings::{self, Settings};
use api::AppState;
use auth::Credentials;

pub async fn run() -> Result<(), String> {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.init();

	let settings = Settings::load();
	let credentials = credentials(&settings);

	let supervisor = Supervisor::new(settings.supervisor_config());
	let config = Arc::new(ConfigGateway::new(
		FileConfigStore::new(settings.nanobot.config_path()),
		GatewaySchema,
	));

	if settings.gateway.autostart {
		autostart(&supervisor, &config);
	}

	let state = AppState {
		supervisor: Arc::clone(&supervisor),
		config,
		credentials: Arc::new(credentials),
		cron_dir: settings.nanobot.cron_dir(),
	};

	let addr = format!("{}:{}", settings.server.host, settings.server.port);
	let listener = tokio::net::TcpListener::bind(&addr)
		.await
		.map_err(|e| format!("failed to bind HTTP on {}: {}", addr, e))?;
	let local: Option<SocketAddr> = listener.local_addr().ok();
	tracing::info!(addr = ?local, pid = std::process::id(), "nanoctl listening");

	let served = axum::serve(listener, api::router(state))
		.with_graceful_shutdown(shutdown_signal())
		.await;

	tracing::info!("stopping gateway");
	supervisor.stop().await;

	served.map_err(|e| format!("HTTP server error: {}", e))
}

fn credentials(settings: &Settings) -> Credentials {
	let password = match &settings.auth.password {
		Some(password) => password.clone(),
		None => {
			let password = settings::generate_password();
			eprintln!("{} {}", "Generated admin password:".yellow().bold(), password);
			password
		}
	};
	Credentials {
		username: settings.auth.username.clone(),
		password,
	}
}

/// Starts the gateway in the background when it has a provider key to use.
fn autostart(supervisor: &Arc<Supervisor>, config: &api::GatewayConfig) {
	match config.load() {
		Ok(tree) if summary::has_provider_key(&tree) => {
			tracing::info!("provider key found, starting gateway");
			let supervisor = Arc::clone(supervisor);
			tokio::spawn(async move { supervisor.start().await });
		}
		Ok(_) => tracing::info!("no provider key configured, gateway not started"),
		Err(e) => tracing::warn!(error = %e, "gateway config unavailable, gateway not started"),
	}
}

async fn shutdown_signal() {
	use tokio::signal::unix::{signal, SignalKind};

	let terminate = async {
		match signal(SignalKind::terminate()) {
			Ok(mut stream) => {
				stream.recv().await;
			}
			Err(e) => {
				tracing::warn!(error = %e, "failed to install SIGTERM handler");
				std::future::pending::<()>().await;
			}
		}
	};

	tokio::select! {
		_ = tokio::signal::ctrl_c() => {},
		_ = terminate => {},
	}
	tracing::info!("shutting down");
}
