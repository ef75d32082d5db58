use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use nanoctl_supervisor::SupervisorConfig;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Deserialize;

use crate::paths;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
	#[serde(default)]
	pub server: ServerSettings,
	#[serde(default)]
	pub auth: AuthSettings,
	#[serde(default)]
	pub gateway: GatewaySettings,
	#[serde(default)]
	pub nanobot: NanobotSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
	#[serde(default = "default_host")]
	pub host: String,
	#[serde(default = "default_port")]
	pub port: u16,
}

impl Default for ServerSettings {
	fn default() -> Self {
		Self {
			host: default_host(),
			port: default_port(),
		}
	}
}

fn default_host() -> String {
	"0.0.0.0".to_string()
}
fn default_port() -> u16 {
	8080
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
	#[serde(default = "default_username")]
	pub username: String,
	pub password: Option<String>,
}

impl Default for AuthSettings {
	fn default() -> Self {
		Self {
			username: default_username(),
			password: None,
		}
	}
}

fn default_username() -> String {
	"admin".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewaySettings {
	#[serde(default = "default_command")]
	pub command: String,
	#[serde(default = "default_args")]
	pub args: Vec<String>,
	#[serde(default)]
	pub env: HashMap<String, String>,
	#[serde(default = "default_stop_timeout")]
	pub stop_timeout_secs: u64,
	#[serde(default = "default_log_lines")]
	pub log_lines: usize,
	#[serde(default = "default_true")]
	pub autostart: bool,
}

impl Default for GatewaySettings {
	fn default() -> Self {
		Self {
			command: default_command(),
			args: default_args(),
			env: HashMap::new(),
			stop_timeout_secs: default_stop_timeout(),
			log_lines: default_log_lines(),
			autostart: true,
		}
	}
}

fn default_command() -> String {
	"nanobot".to_string()
}
fn default_args() -> Vec<String> {
	vec!["gateway".to_string()]
}
fn default_stop_timeout() -> u64 {
	10
}
fn default_log_lines() -> usize {
	500
}
fn default_true() -> bool {
	true
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct NanobotSettings {
	pub home: Option<PathBuf>,
}

impl NanobotSettings {
	pub fn home(&self) -> PathBuf {
		self.home.clone().unwrap_or_else(paths::default_nanobot_home)
	}

	pub fn config_path(&self) -> PathBuf {
		self.home().join("config.json")
	}

	pub fn cron_dir(&self) -> PathBuf {
		self.home().join("cron")
	}
}

impl Settings {
	/// Reads the settings file, falling back to defaults on any problem, then
	/// applies environment overrides.
	pub fn load() -> Self {
		let mut settings = load_file(&paths::settings_path());
		settings.apply_overrides(|key| std::env::var(key).ok());
		settings
	}

	pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
		if let Some(port) = lookup("PORT") {
			match port.parse() {
				Ok(port) => self.server.port = port,
				Err(_) => tracing::warn!(value = %port, "ignoring invalid PORT"),
			}
		}
		if let Some(username) = lookup("ADMIN_USERNAME").filter(|u| !u.is_empty()) {
			self.auth.username = username;
		}
		if let Some(password) = lookup("ADMIN_PASSWORD").filter(|p| !p.is_empty()) {
			self.auth.password = Some(password);
		}
	}

	pub fn supervisor_config(&self) -> SupervisorConfig {
		SupervisorConfig {
			program: self.gateway.command.clone(),
			args: self.gateway.args.clone(),
			env: self.gateway.env.clone(),
			dir: None,
			stop_timeout: Duration::from_secs(self.gateway.stop_timeout_secs),
			log_lines: self.gateway.log_lines,
		}
	}
}

pub fn load_file(path: &Path) -> Settings {
	if path.exists() {
		match std::fs::read_to_string(path) {
			Ok(content) => match toml::from_str(&content) {
				Ok(settings) => return settings,
				Err(e) => tracing::warn!("failed to parse {}: {}", path.display(), e),
			},
			Err(e) => tracing::warn!("failed to read {}: {}", path.display(), e),
		}
	}
	Settings::default()
}

pub fn generate_password() -> String {
	rand::thread_rng()
		.sample_iter(&Alphanumeric)
		.take(22)
		.map(char::from)
		.collect()
}
