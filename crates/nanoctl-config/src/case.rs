//! snake_case ⇄ camelCase key conversion. The gateway's file and the web
//! client speak camelCase; validation works on snake_case.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

static ACRONYM_BOUNDARY: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"([A-Z]+)([A-Z][a-z])").expect("valid acronym pattern"));
static WORD_BOUNDARY: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"([a-z0-9])([A-Z])").expect("valid word pattern"));

pub fn to_snake_case(key: &str) -> String {
	let step = ACRONYM_BOUNDARY.replace_all(key, "${1}_${2}");
	WORD_BOUNDARY.replace_all(&step, "${1}_${2}").to_lowercase()
}

pub fn to_camel_case(key: &str) -> String {
	let mut parts = key.split('_');
	let mut camel = parts.next().unwrap_or_default().to_string();
	for part in parts {
		let mut chars = part.chars();
		if let Some(first) = chars.next() {
			camel.extend(first.to_uppercase());
			camel.push_str(chars.as_str());
		}
	}
	camel
}

pub fn keys_to_snake(tree: &Value) -> Value {
	convert_keys(tree, &to_snake_case)
}

pub fn keys_to_camel(tree: &Value) -> Value {
	convert_keys(tree, &to_camel_case)
}

fn convert_keys(tree: &Value, convert: &dyn Fn(&str) -> String) -> Value {
	match tree {
		Value::Object(map) => Value::Object(
			map.iter()
				.map(|(key, value)| (convert(key), convert_keys(value, convert)))
				.collect(),
		),
		Value::Array(items) => Value::Array(items.iter().map(|item| convert_keys(item, convert)).collect()),
		other => other.clone(),
	}
}
