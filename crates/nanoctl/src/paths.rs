use std::path::PathBuf;

pub const APP_NAME: &str = "nanoctl";

pub fn config_dir() -> PathBuf {
	if let Ok(dir) = std::env::var("XDG_CONFIG_HOME") {
		PathBuf::from(dir).join(APP_NAME)
	} else if let Some(home) = home_dir() {
		home.join(".config").join(APP_NAME)
	} else {
		PathBuf::from("/tmp").join(APP_NAME).join("config")
	}
}

/// The control plane's own settings file. `NANOCTL_CONFIG` overrides it.
pub fn settings_path() -> PathBuf {
	match std::env::var("NANOCTL_CONFIG") {
		Ok(path) if !path.is_empty() => PathBuf::from(path),
		_ => config_dir().join("config.toml"),
	}
}

/// Where nanobot keeps its state when not configured otherwise.
pub fn default_nanobot_home() -> PathBuf {
	match home_dir() {
		Some(home) => home.join(".nanobot"),
		None => PathBuf::from("/tmp").join(".nanobot"),
	}
}

fn home_dir() -> Option<PathBuf> {
	std::env::var("HOME").ok().map(PathBuf::from)
}
