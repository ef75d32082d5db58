//! Masking of secret fields for display, and the reverse merge that puts the
//! real secrets back when a client submits a tree it received masked.

use serde_json::{Map, Value};

pub const MASK_MARKER: &str = "***";

/// Keys whose string values are never shown in full, in both spellings.
pub const SECRET_FIELDS: &[&str] = &[
	"api_key",
	"apiKey",
	"token",
	"app_secret",
	"appSecret",
	"encrypt_key",
	"encryptKey",
	"verification_token",
	"verificationToken",
];

const VISIBLE_PREFIX: usize = 8;
const MIN_REDACTED_LEN: usize = 3;

pub fn is_secret_field(key: &str) -> bool {
	SECRET_FIELDS.contains(&key)
}

/// `sk-abcdefgh12345` → `sk-abcde***`; values of 8 characters or fewer
/// are hidden completely.
pub fn mask_value(value: &str) -> String {
	if value.chars().count() > VISIBLE_PREFIX {
		let prefix: String = value.chars().take(VISIBLE_PREFIX).collect();
		format!("{}{}", prefix, MASK_MARKER)
	} else {
		MASK_MARKER.to_string()
	}
}

/// A submitted secret that means "keep what you have".
pub fn is_placeholder(value: &str) -> bool {
	value.is_empty() || value.ends_with(MASK_MARKER)
}

pub fn mask(tree: &Value) -> Value {
	match tree {
		Value::Object(map) => Value::Object(
			map.iter()
				.map(|(key, value)| {
					let masked = match value {
						Value::String(s) if is_secret_field(key) && !s.is_empty() => {
							Value::String(mask_value(s))
						}
						other => mask(other),
					};
					(key.clone(), masked)
				})
				.collect(),
		),
		Value::Array(items) => Value::Array(items.iter().map(mask).collect()),
		other => other.clone(),
	}
}

/// Resolves masked placeholders in `submitted` against `previous`.
///
/// Only mappings are walked; sequences and scalars come from `submitted`
/// as-is.
pub fn merge(submitted: &Value, previous: &Value) -> Value {
	let (Value::Object(new), Value::Object(old)) = (submitted, previous) else {
		return submitted.clone();
	};

	let empty = Value::Object(Map::new());
	let merged = new
		.iter()
		.map(|(key, value)| {
			let resolved = match value {
				Value::String(s) if is_secret_field(key) && is_placeholder(s) => old
					.get(key)
					.cloned()
					.unwrap_or_else(|| Value::String(String::new())),
				other => merge(other, old.get(key).unwrap_or(&empty)),
			};
			(key.clone(), resolved)
		})
		.collect();
	Value::Object(merged)
}

/// Every string stored under a secret key anywhere in the tree.
pub fn secret_values(tree: &Value) -> Vec<&str> {
	let mut found = Vec::new();
	collect_secrets(tree, &mut found);
	found
}

fn collect_secrets<'a>(tree: &'a Value, found: &mut Vec<&'a str>) {
	match tree {
		Value::Object(map) => {
			for (key, value) in map {
				match value {
					Value::String(s) if is_secret_field(key) => found.push(s),
					other => collect_secrets(other, found),
				}
			}
		}
		Value::Array(items) => {
			for item in items {
				collect_secrets(item, found);
			}
		}
		_ => {}
	}
}

/// Replaces any secret held in `tree` that occurs in `message` with the
/// mask marker. Secrets of 3 characters or fewer are left alone.
pub fn redact(message: &str, tree: &Value) -> String {
	let mut secrets: Vec<String> = Vec::new();
	for secret in secret_values(tree) {
		if secret.chars().count() <= MIN_REDACTED_LEN {
			continue;
		}
		// serde quotes offending strings with {:?}, escaping quotes and backslashes
		let debug = format!("{:?}", secret);
		let escaped = &debug[1..debug.len() - 1];
		if escaped != secret {
			secrets.push(escaped.to_string());
		}
		secrets.push(secret.to_string());
	}
	secrets.sort_unstable();
	secrets.dedup();
	// Longest first so a secret containing another is not half-replaced
	secrets.sort_by_key(|s| std::cmp::Reverse(s.len()));

	let mut redacted = message.to_string();
	for secret in &secrets {
		redacted = redacted.replace(secret.as_str(), MASK_MARKER);
	}
	redacted
}
