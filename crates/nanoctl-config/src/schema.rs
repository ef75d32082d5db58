use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

/// Decides whether a snake_case tree is an acceptable gateway configuration.
/// On success returns the tree to persist; on failure a human-readable
/// message, which may quote submitted values verbatim.
pub trait SchemaValidator: Send + Sync {
	fn validate(&self, tree: &Value) -> Result<Value, String>;
}

/// The gateway's own configuration shape. Sections it does not know about
/// are passed through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct GatewaySchema;

// The section types below only check field types. Unknown fields are
// ignored, and the values themselves are never read.

#[derive(Deserialize)]
struct ProviderConfig {
	#[serde(default, rename = "api_key")]
	_api_key: String,
	#[serde(default, rename = "api_base")]
	_api_base: Option<String>,
	#[serde(default, rename = "extra_headers")]
	_extra_headers: Option<HashMap<String, String>>,
}

#[derive(Deserialize)]
struct ChannelConfig {
	#[serde(default, rename = "enabled")]
	_enabled: bool,
	#[serde(default, rename = "allow_from")]
	_allow_from: Vec<String>,
}

#[derive(Deserialize)]
struct GatewaySection {
	#[serde(default, rename = "host")]
	_host: String,
	#[serde(default, rename = "port")]
	_port: u16,
}

impl SchemaValidator for GatewaySchema {
	fn validate(&self, tree: &Value) -> Result<Value, String> {
		let root = tree
			.as_object()
			.ok_or_else(|| format!("config: expected an object, got {}", kind(tree)))?;

		if let Some(providers) = root.get("providers") {
			for (name, provider) in section(providers, "providers")? {
				check::<ProviderConfig>(provider, &format!("providers.{}", name))?;
			}
		}
		if let Some(channels) = root.get("channels") {
			for (name, channel) in section(channels, "channels")? {
				check::<ChannelConfig>(channel, &format!("channels.{}", name))?;
			}
		}
		if let Some(gateway) = root.get("gateway") {
			check::<GatewaySection>(gateway, "gateway")?;
		}
		for name in ["agents", "tools"] {
			if let Some(value) = root.get(name) {
				section(value, name)?;
			}
		}

		Ok(tree.clone())
	}
}

fn section<'a>(value: &'a Value, path: &str) -> Result<&'a Map<String, Value>, String> {
	value
		.as_object()
		.ok_or_else(|| format!("{}: expected an object, got {}", path, kind(value)))
}

fn check<T: DeserializeOwned>(value: &Value, path: &str) -> Result<(), String> {
	T::deserialize(value).map(|_| ()).map_err(|e| format!("{}: {}", path, e))
}

fn kind(value: &Value) -> &'static str {
	match value {
		Value::Null => "null",
		Value::Bool(_) => "a boolean",
		Value::Number(_) => "a number",
		Value::String(_) => "a string",
		Value::Array(_) => "an array",
		Value::Object(_) => "an object",
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn valid() -> Value {
		json!({
			"providers": {
				"openrouter": { "api_key": "sk-or-1", "api_base": null },
				"custom": { "api_key": "", "extra_headers": { "x-app": "nanobot" } }
			},
			"channels": {
				"telegram": { "enabled": true, "token": "123:abc", "allow_from": ["42"] },
				"feishu": { "enabled": false, "app_id": "cli", "app_secret": "s" }
			},
			"gateway": { "host": "127.0.0.1", "port": 18790 },
			"agents": { "defaults": { "model": "anthropic/claude" } },
			"tools": {},
			"unknown_section": [1, 2, 3]
		})
	}

	#[test]
	fn accepts_and_returns_valid_tree() {
		let tree = valid();
		assert_eq!(GatewaySchema.validate(&tree).unwrap(), tree);
	}

	#[test]
	fn empty_config_is_valid() {
		assert!(GatewaySchema.validate(&json!({})).is_ok());
	}

	#[test]
	fn rejects_non_object_root() {
		let err = GatewaySchema.validate(&json!([1])).unwrap_err();
		assert_eq!(err, "config: expected an object, got an array");
	}

	#[test]
	fn rejects_wrong_channel_field_type() {
		let mut tree = valid();
		tree["channels"]["telegram"]["enabled"] = json!("yes please");
		let err = GatewaySchema.validate(&tree).unwrap_err();
		assert!(err.starts_with("channels.telegram: "), "{}", err);
		assert!(err.contains("yes please"), "{}", err);
	}

	#[test]
	fn rejects_bad_port() {
		let mut tree = valid();
		tree["gateway"]["port"] = json!(70000);
		let err = GatewaySchema.validate(&tree).unwrap_err();
		assert!(err.starts_with("gateway: "), "{}", err);
	}

	#[test]
	fn rejects_non_string_api_key() {
		let mut tree = valid();
		tree["providers"]["openrouter"]["api_key"] = json!(12);
		let err = GatewaySchema.validate(&tree).unwrap_err();
		assert!(err.starts_with("providers.openrouter: "), "{}", err);
	}

	#[test]
	fn rejects_scalar_section() {
		let mut tree = valid();
		tree["tools"] = json!("none");
		assert_eq!(GatewaySchema.validate(&tree).unwrap_err(), "tools: expected an object, got a string");
	}
}
