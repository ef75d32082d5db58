use std::collections::HashMap;
use std::io;
use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use tokio::net::unix::pipe;
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::output::{LogRing, OutputCodec, DEFAULT_LOG_LINES};
use crate::types::{GatewayStatus, ProcessState};

pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
	pub program: String,
	pub args: Vec<String>,
	pub env: HashMap<String, String>,
	pub dir: Option<PathBuf>,
	/// How long a SIGTERM'd gateway gets before it is killed.
	pub stop_timeout: Duration,
	pub log_lines: usize,
}

impl Default for SupervisorConfig {
	fn default() -> Self {
		Self {
			program: "nanobot".to_string(),
			args: vec!["gateway".to_string()],
			env: HashMap::new(),
			dir: None,
			stop_timeout: DEFAULT_STOP_TIMEOUT,
			log_lines: DEFAULT_LOG_LINES,
		}
	}
}

/// Owns the one gateway process and its lifecycle.
///
/// `start`, `stop` and `restart` may be called concurrently from any number
/// of tasks; they are serialized on an internal lock so at most one gateway
/// process is alive at a time. Failures never surface as errors: they end up
/// in [`Supervisor::status`] and [`Supervisor::logs`].
pub struct Supervisor {
	config: SupervisorConfig,
	logs: LogRing,
	status: Arc<RwLock<StatusCell>>,
	lifecycle: Mutex<Option<Instance>>,
}

struct StatusCell {
	state: ProcessState,
	pid: Option<u32>,
	started_at: Option<Instant>,
	restart_count: u32,
}

/// A spawned gateway together with the worker that drains and reaps it.
struct Instance {
	pid: Option<u32>,
	cancel: CancellationToken,
	worker: JoinHandle<()>,
}

/// stdout and stderr of the gateway, read from a single shared pipe.
type OutputLines = FramedRead<pipe::Receiver, OutputCodec>;

impl Supervisor {
	pub fn new(config: SupervisorConfig) -> Arc<Self> {
		let logs = LogRing::new(config.log_lines);
		Arc::new(Self {
			config,
			logs,
			status: Arc::new(RwLock::new(StatusCell {
				state: ProcessState::Stopped,
				pid: None,
				started_at: None,
				restart_count: 0,
			})),
			lifecycle: Mutex::new(None),
		})
	}

	pub fn config(&self) -> &SupervisorConfig {
		&self.config
	}

	pub fn logs(&self) -> &LogRing {
		&self.logs
	}

	pub async fn state(&self) -> ProcessState {
		self.status.read().await.state
	}

	pub async fn status(&self) -> GatewayStatus {
		let cell = self.status.read().await;
		let uptime_secs = match cell.state {
			ProcessState::Running => cell.started_at.map(|t| t.elapsed().as_secs()),
			_ => None,
		};
		GatewayStatus {
			state: cell.state,
			pid: cell.pid,
			uptime_secs,
			restart_count: cell.restart_count,
		}
	}

	/// Spawns the gateway unless one is already alive.
	pub async fn start(&self) {
		let mut current = self.lifecycle.lock().await;
		self.start_locked(&mut current).await;
	}

	/// Terminates the gateway, escalating to SIGKILL after the stop timeout.
	pub async fn stop(&self) {
		let mut current = self.lifecycle.lock().await;
		self.stop_locked(&mut current).await;
	}

	/// Stop then start as one step. Counts a restart whatever the prior state.
	pub async fn restart(&self) {
		let mut current = self.lifecycle.lock().await;
		self.stop_locked(&mut current).await;
		self.status.write().await.restart_count += 1;
		self.start_locked(&mut current).await;
	}

	/// The worker clears the pid once the process is reaped, so a gateway
	/// that already exited counts as dead even before its worker returns.
	async fn is_alive(&self, current: &Option<Instance>) -> bool {
		match current {
			Some(instance) => !instance.worker.is_finished() && self.status.read().await.pid.is_some(),
			None => false,
		}
	}

	async fn start_locked(&self, current: &mut Option<Instance>) {
		if self.is_alive(current).await {
			debug!(pid = ?current.as_ref().and_then(|i| i.pid), "gateway already running");
			return;
		}
		if let Some(finished) = current.take() {
			let _ = finished.worker.await;
		}

		self.status.write().await.state = ProcessState::Starting;

		let (child, lines) = match spawn_gateway(&self.config) {
			Ok(spawned) => spawned,
			Err(e) => {
				error!(program = %self.config.program, error = %e, "failed to start gateway");
				self.logs.push(format!("Failed to start gateway: {}", e)).await;
				let mut cell = self.status.write().await;
				cell.state = ProcessState::Error;
				cell.pid = None;
				cell.started_at = None;
				return;
			}
		};

		let pid = child.id();
		{
			let mut cell = self.status.write().await;
			cell.state = ProcessState::Running;
			cell.pid = pid;
			cell.started_at = Some(Instant::now());
		}
		info!(pid = ?pid, program = %self.config.program, "gateway started");

		let cancel = CancellationToken::new();
		let worker = tokio::spawn(supervise(
			child,
			lines,
			self.logs.clone(),
			Arc::clone(&self.status),
			cancel.clone(),
			self.config.stop_timeout,
		));
		*current = Some(Instance { pid, cancel, worker });
	}

	async fn stop_locked(&self, current: &mut Option<Instance>) {
		let alive = self.is_alive(current).await;
		let instance = match current.take() {
			Some(instance) if alive => instance,
			Some(finished) => {
				let _ = finished.worker.await;
				self.mark_stopped().await;
				return;
			}
			None => {
				self.mark_stopped().await;
				return;
			}
		};

		self.status.write().await.state = ProcessState::Stopping;
		instance.cancel.cancel();
		if let Err(e) = instance.worker.await {
			warn!(error = %e, "gateway worker ended abnormally");
		}
		self.mark_stopped().await;
		info!(pid = ?instance.pid, "gateway stopped");
	}

	async fn mark_stopped(&self) {
		let mut cell = self.status.write().await;
		cell.state = ProcessState::Stopped;
		cell.pid = None;
		cell.started_at = None;
	}
}

/// Spawns the gateway with stdout and stderr on one pipe, so the reader sees
/// both streams in the order the process wrote them.
fn spawn_gateway(config: &SupervisorConfig) -> io::Result<(Child, OutputLines)> {
	let (reader, writer) = io::pipe()?;
	let receiver = pipe::Receiver::from_owned_fd(reader.into())?;

	let mut cmd = Command::new(&config.program);
	cmd.args(&config.args)
		.envs(&config.env)
		.stdin(Stdio::null())
		.stdout(writer.try_clone()?)
		.stderr(writer)
		.kill_on_drop(true)
		// Own process group so signals reach the whole tree
		.process_group(0);

	if let Some(dir) = &config.dir {
		cmd.current_dir(dir);
	}

	let child = cmd.spawn()?;
	// Our copies of the write end must close or the reader never sees EOF
	drop(cmd);
	Ok((child, FramedRead::new(receiver, OutputCodec::new())))
}

/// Drains output until EOF, then reaps the process. Cancellation switches to
/// a graceful shutdown and returns without recording anything.
async fn supervise(
	mut child: Child,
	mut lines: OutputLines,
	logs: LogRing,
	status: Arc<RwLock<StatusCell>>,
	cancel: CancellationToken,
	stop_timeout: Duration,
) {
	let mut open = true;
	let exit = loop {
		tokio::select! {
			biased;
			_ = cancel.cancelled() => break None,
			frame = lines.next(), if open => match frame {
				Some(Ok(line)) => logs.push(line).await,
				// Keep draining so the gateway never blocks on a full pipe
				Some(Err(e)) => warn!(error = %e, "failed to read gateway output"),
				None => open = false,
			},
			exit = child.wait(), if !open => break Some(exit),
		}
	};

	match exit {
		Some(result) => record_exit(result, &logs, &status).await,
		None => shutdown(&mut child, &mut lines, &logs, stop_timeout).await,
	}
}

async fn record_exit(result: io::Result<ExitStatus>, logs: &LogRing, status: &RwLock<StatusCell>) {
	let code = match result {
		Ok(exit) => exit_code(exit),
		Err(e) => {
			warn!(error = %e, "failed to wait on gateway");
			-1
		}
	};

	let mut cell = status.write().await;
	cell.pid = None;
	if cell.state == ProcessState::Running {
		warn!(code, "gateway exited unexpectedly");
		// Logged before the state flips so pollers never see Error without it
		logs.push(format!("Gateway exited with code {}", code)).await;
		cell.state = ProcessState::Error;
		cell.started_at = None;
	}
}

async fn shutdown(child: &mut Child, lines: &mut OutputLines, logs: &LogRing, stop_timeout: Duration) {
	let Some(pid) = child.id() else {
		return;
	};
	signal_group(pid, nix::sys::signal::Signal::SIGTERM);

	let deadline = tokio::time::sleep(stop_timeout);
	tokio::pin!(deadline);
	let mut open = true;
	loop {
		tokio::select! {
			exit = child.wait() => {
				debug!(pid, ?exit, "gateway exited after SIGTERM");
				return;
			}
			frame = lines.next(), if open => match frame {
				Some(Ok(line)) => logs.push(line).await,
				Some(Err(e)) => warn!(error = %e, "failed to read gateway output"),
				None => open = false,
			},
			_ = &mut deadline => break,
		}
	}

	warn!(pid, timeout_secs = stop_timeout.as_secs_f64(), "gateway ignored SIGTERM, killing");
	signal_group(pid, nix::sys::signal::Signal::SIGKILL);
	if let Err(e) = child.kill().await {
		debug!(pid, error = %e, "force kill failed");
	}
	let _ = child.wait().await;
}

fn signal_group(pid: u32, signal: nix::sys::signal::Signal) {
	use nix::sys::signal::killpg;
	use nix::unistd::Pid;
	if let Err(e) = killpg(Pid::from_raw(pid as i32), signal) {
		debug!(pid, ?signal, error = %e, "failed to signal gateway process group");
	}
}

/// Exit code, or the negated signal number when the process was killed.
fn exit_code(status: ExitStatus) -> i32 {
	status
		.code()
		.or_else(|| status.signal().map(|sig| -sig))
		.unwrap_or(-1)
}
