use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProcessState {
	Stopped,
	Starting,
	Running,
	Stopping,
	Error,
}

impl ProcessState {
	pub fn is_running(&self) -> bool {
		matches!(self, ProcessState::Running)
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			ProcessState::Stopped => "stopped",
			ProcessState::Starting => "starting",
			ProcessState::Running => "running",
			ProcessState::Stopping => "stopping",
			ProcessState::Error => "error",
		}
	}
}

impl std::fmt::Display for ProcessState {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Point-in-time view of the supervised gateway.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GatewayStatus {
	pub state: ProcessState,
	pub pid: Option<u32>,
	#[serde(rename = "uptime")]
	pub uptime_secs: Option<u64>,
	pub restart_count: u32,
}
