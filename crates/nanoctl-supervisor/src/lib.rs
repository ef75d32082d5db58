//! # nanoctl-supervisor
//!
//! Supervises a single long-running gateway process.
//!
//! Start, stop, and restart it from any task, poll its status, and read the
//! last few hundred lines it printed.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use nanoctl_supervisor::{Supervisor, SupervisorConfig};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let sup = Supervisor::new(SupervisorConfig {
//!     program: "nanobot".into(),
//!     args: vec!["gateway".into()],
//!     ..SupervisorConfig::default()
//! });
//!
//! sup.start().await;
//! println!("{:?}", sup.status().await);
//! for line in sup.logs().snapshot().await {
//!     println!("{}", line);
//! }
//! sup.stop().await;
//! # }
//! ```

pub mod output;
pub mod supervisor;
pub mod types;

pub use output::LogRing;
pub use supervisor::{Supervisor, SupervisorConfig, DEFAULT_STOP_TIMEOUT};
pub use types::*;
