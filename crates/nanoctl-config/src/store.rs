use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::case::{keys_to_camel, keys_to_snake};
use crate::error::ConfigError;

/// Where the gateway's configuration lives. Trees crossing this boundary use
/// snake_case keys, whatever the backing format stores.
pub trait ConfigStore: Send + Sync {
	fn load(&self) -> Result<Value, ConfigError>;
	fn save(&self, tree: &Value) -> Result<(), ConfigError>;
}

/// The gateway's `config.json`, camelCase on disk.
#[derive(Debug, Clone)]
pub struct FileConfigStore {
	path: PathBuf,
}

impl FileConfigStore {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	fn temp_path(&self) -> PathBuf {
		let mut name = self
			.path
			.file_name()
			.map(|n| n.to_os_string())
			.unwrap_or_else(|| "config.json".into());
		name.push(format!(".{}.tmp", std::process::id()));
		self.path.with_file_name(name)
	}
}

impl ConfigStore for FileConfigStore {
	fn load(&self) -> Result<Value, ConfigError> {
		let content = std::fs::read_to_string(&self.path).map_err(|source| ConfigError::Load {
			path: self.path.clone(),
			source,
		})?;
		let tree: Value = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
			path: self.path.clone(),
			source,
		})?;
		Ok(keys_to_snake(&tree))
	}

	fn save(&self, tree: &Value) -> Result<(), ConfigError> {
		let save_err = |source| ConfigError::Save {
			path: self.path.clone(),
			source,
		};

		let content = serde_json::to_string_pretty(&keys_to_camel(tree))
			.map_err(|e| save_err(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;

		if let Some(parent) = self.path.parent() {
			if !parent.as_os_str().is_empty() {
				std::fs::create_dir_all(parent).map_err(save_err)?;
			}
		}

		// Readers never see a half-written file
		let tmp = self.temp_path();
		if let Err(e) = std::fs::write(&tmp, content + "\n") {
			let _ = std::fs::remove_file(&tmp);
			return Err(save_err(e));
		}
		if let Err(e) = std::fs::rename(&tmp, &self.path) {
			let _ = std::fs::remove_file(&tmp);
			return Err(save_err(e));
		}
		debug!(path = %self.path.display(), "config saved");
		Ok(())
	}
}
