use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("failed to read {}: {source}", path.display())]
	Load {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("failed to parse {}: {source}", path.display())]
	Parse {
		path: PathBuf,
		#[source]
		source: serde_json::Error,
	},

	#[error("failed to write {}: {source}", path.display())]
	Save {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	/// Schema rejection. The message has already been scrubbed of secrets.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl ConfigError {
	pub fn is_validation(&self) -> bool {
		matches!(self, ConfigError::Validation(_))
	}
}
