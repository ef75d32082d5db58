use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::case::{keys_to_camel, keys_to_snake};
use crate::error::ConfigError;
use crate::schema::SchemaValidator;
use crate::secrets::{mask, merge, redact};
use crate::store::ConfigStore;

/// Reads and edits the gateway configuration without handing out secrets.
///
/// Clients see camelCase trees with secrets masked. Edits are merged against
/// the stored secrets, validated, and saved while holding a single write lock,
/// so two concurrent edits never interleave their load and save.
pub struct ConfigGateway<S, V> {
	store: S,
	validator: V,
	write_lock: Mutex<()>,
}

impl<S: ConfigStore, V: SchemaValidator> ConfigGateway<S, V> {
	pub fn new(store: S, validator: V) -> Self {
		Self {
			store,
			validator,
			write_lock: Mutex::new(()),
		}
	}

	pub fn store(&self) -> &S {
		&self.store
	}

	/// The stored config in canonical snake_case, secrets included. Never hand
	/// this to a client.
	pub fn load(&self) -> Result<Value, ConfigError> {
		self.store.load()
	}

	pub fn read_for_display(&self) -> Result<Value, ConfigError> {
		Ok(mask(&keys_to_camel(&self.store.load()?)))
	}

	/// Applies a camelCase tree as returned by [`read_for_display`] and
	/// possibly edited. Masked or empty secrets keep their stored value.
	///
	/// [`read_for_display`]: ConfigGateway::read_for_display
	pub async fn apply_edit(&self, submitted: &Value) -> Result<(), ConfigError> {
		let _guard = self.write_lock.lock().await;

		let existing = keys_to_camel(&self.store.load()?);
		let merged = keys_to_snake(&merge(submitted, &existing));

		let validated = self.validator.validate(&merged).map_err(|message| {
			let message = redact(&message, &merged);
			warn!(error = %message, "config rejected");
			ConfigError::Validation(message)
		})?;

		self.store.save(&validated)?;
		info!("config updated");
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::schema::GatewaySchema;
	use serde_json::json;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::sync::{Arc, Mutex as StdMutex};

	#[derive(Clone, Default)]
	struct MemoryStore {
		tree: Arc<StdMutex<Option<Value>>>,
		saves: Arc<AtomicUsize>,
	}

	impl MemoryStore {
		fn with(tree: Value) -> Self {
			let store = Self::default();
			*store.tree.lock().unwrap() = Some(tree);
			store
		}

		fn current(&self) -> Value {
			self.tree.lock().unwrap().clone().unwrap()
		}
	}

	impl ConfigStore for MemoryStore {
		fn load(&self) -> Result<Value, ConfigError> {
			self.tree.lock().unwrap().clone().ok_or_else(|| ConfigError::Load {
				path: "memory".into(),
				source: std::io::Error::new(std::io::ErrorKind::NotFound, "no config"),
			})
		}

		fn save(&self, tree: &Value) -> Result<(), ConfigError> {
			self.saves.fetch_add(1, Ordering::SeqCst);
			*self.tree.lock().unwrap() = Some(tree.clone());
			Ok(())
		}
	}

	struct Reject(&'static str);

	impl SchemaValidator for Reject {
		fn validate(&self, _tree: &Value) -> Result<Value, String> {
			Err(self.0.to_string())
		}
	}

	struct Accept;

	impl SchemaValidator for Accept {
		fn validate(&self, tree: &Value) -> Result<Value, String> {
			Ok(tree.clone())
		}
	}

	fn stored() -> Value {
		json!({
			"providers": { "openrouter": { "api_key": "sk-or-v1-0123456789", "api_base": null } },
			"channels": { "telegram": { "enabled": true, "token": "123456:ABCDEFGH", "allow_from": [] } }
		})
	}

	#[test]
	fn read_for_display_is_camel_and_masked() {
		let gateway = ConfigGateway::new(MemoryStore::with(stored()), Accept);
		let shown = gateway.read_for_display().unwrap();
		assert_eq!(shown, json!({
			"providers": { "openrouter": { "apiKey": "sk-or-v1***", "apiBase": null } },
			"channels": { "telegram": { "enabled": true, "token": "123456:A***", "allowFrom": [] } }
		}));
	}

	#[test]
	fn read_for_display_propagates_load_error() {
		let gateway = ConfigGateway::new(MemoryStore::default(), Accept);
		assert!(matches!(gateway.read_for_display(), Err(ConfigError::Load { .. })));
	}

	#[tokio::test]
	async fn unedited_display_tree_saves_original() {
		let store = MemoryStore::with(stored());
		let gateway = ConfigGateway::new(store.clone(), GatewaySchema);

		let shown = gateway.read_for_display().unwrap();
		gateway.apply_edit(&shown).await.unwrap();

		assert_eq!(store.current(), stored());
		assert_eq!(store.saves.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn edit_keeps_masked_secret_and_applies_changes() {
		let store = MemoryStore::with(stored());
		let gateway = ConfigGateway::new(store.clone(), GatewaySchema);

		let mut shown = gateway.read_for_display().unwrap();
		shown["channels"]["telegram"]["enabled"] = json!(false);
		shown["providers"]["anthropic"] = json!({ "apiKey": "sk-ant-new-key" });
		gateway.apply_edit(&shown).await.unwrap();

		let saved = store.current();
		assert_eq!(saved["providers"]["openrouter"]["api_key"], "sk-or-v1-0123456789");
		assert_eq!(saved["providers"]["anthropic"]["api_key"], "sk-ant-new-key");
		assert_eq!(saved["channels"]["telegram"]["token"], "123456:ABCDEFGH");
		assert_eq!(saved["channels"]["telegram"]["enabled"], false);
	}

	#[tokio::test]
	async fn validation_error_is_redacted_and_nothing_saved() {
		let store = MemoryStore::with(stored());
		let gateway = ConfigGateway::new(
			store.clone(),
			Reject("bad token 123456:ABCDEFGH and key sk-or-v1-0123456789"),
		);

		let shown = gateway.read_for_display().unwrap();
		let err = gateway.apply_edit(&shown).await.unwrap_err();

		assert!(err.is_validation());
		assert_eq!(err.to_string(), "Validation error: bad token *** and key ***");
		assert_eq!(store.saves.load(Ordering::SeqCst), 0);
		assert_eq!(store.current(), stored());
	}

	#[tokio::test]
	async fn schema_error_quoting_a_secret_is_redacted() {
		let store = MemoryStore::with(stored());
		let gateway = ConfigGateway::new(store.clone(), GatewaySchema);

		let submitted = json!({
			"channels": { "telegram": { "token": "123:SECRETVALUE", "enabled": "123:SECRETVALUE" } }
		});
		let err = gateway.apply_edit(&submitted).await.unwrap_err();

		let message = err.to_string();
		assert!(err.is_validation());
		assert!(!message.contains("SECRETVALUE"), "{}", message);
		assert!(message.contains("***"), "{}", message);
		assert_eq!(store.saves.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn schema_error_quoting_an_escaped_secret_is_redacted() {
		let store = MemoryStore::with(stored());
		let gateway = ConfigGateway::new(store.clone(), GatewaySchema);

		let secret = r#"pa"ss\word-TOPSECRET"#;
		let submitted = json!({
			"channels": { "telegram": { "token": secret, "enabled": secret } }
		});
		let err = gateway.apply_edit(&submitted).await.unwrap_err();

		let message = err.to_string();
		assert!(err.is_validation());
		assert!(!message.contains("TOPSECRET"), "{}", message);
		assert!(message.contains("\"***\""), "{}", message);
		assert_eq!(store.saves.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn load_error_aborts_edit() {
		let store = MemoryStore::default();
		let gateway = ConfigGateway::new(store.clone(), Accept);
		let err = gateway.apply_edit(&json!({})).await.unwrap_err();
		assert!(matches!(err, ConfigError::Load { .. }));
		assert_eq!(store.saves.load(Ordering::SeqCst), 0);
	}

	/// Counts how many validations overlap in time.
	struct Overlap {
		active: AtomicUsize,
		max: AtomicUsize,
	}

	impl SchemaValidator for Arc<Overlap> {
		fn validate(&self, tree: &Value) -> Result<Value, String> {
			let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
			self.max.fetch_max(now, Ordering::SeqCst);
			std::thread::sleep(std::time::Duration::from_millis(20));
			self.active.fetch_sub(1, Ordering::SeqCst);
			Ok(tree.clone())
		}
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
	async fn concurrent_edits_are_serialized() {
		let overlap = Arc::new(Overlap {
			active: AtomicUsize::new(0),
			max: AtomicUsize::new(0),
		});
		let store = MemoryStore::with(json!({ "n": 0 }));
		let gateway = Arc::new(ConfigGateway::new(store.clone(), Arc::clone(&overlap)));

		let tasks: Vec<_> = (1..=6)
			.map(|n| {
				let gateway = Arc::clone(&gateway);
				tokio::spawn(async move { gateway.apply_edit(&json!({ "n": n })).await })
			})
			.collect();
		for task in tasks {
			task.await.unwrap().unwrap();
		}

		assert_eq!(overlap.max.load(Ordering::SeqCst), 1);
		assert_eq!(store.saves.load(Ordering::SeqCst), 6);
	}
}
