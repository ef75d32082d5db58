//! # nanoctl-config
//!
//! Secret-safe viewing and editing of the gateway's `config.json`.
//!
//! ```rust,no_run
//! use nanoctl_config::{ConfigGateway, FileConfigStore, GatewaySchema};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), nanoctl_config::ConfigError> {
//! let gateway = ConfigGateway::new(FileConfigStore::new("/home/me/.nanobot/config.json"), GatewaySchema);
//!
//! let mut shown = gateway.read_for_display()?;
//! shown["agents"]["defaults"]["model"] = "anthropic/claude-sonnet".into();
//! gateway.apply_edit(&shown).await?;
//! # Ok(())
//! # }
//! ```

pub mod case;
pub mod error;
pub mod gateway;
pub mod schema;
pub mod secrets;
pub mod store;
pub mod summary;

pub use error::ConfigError;
pub use gateway::ConfigGateway;
pub use schema::{GatewaySchema, SchemaValidator};
pub use secrets::{mask, merge, MASK_MARKER, SECRET_FIELDS};
pub use store::{ConfigStore, FileConfigStore};
