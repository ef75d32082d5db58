//! Overview of which providers and channels a snake_case config sets up.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderSummary {
	pub configured: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelSummary {
	pub enabled: bool,
}

pub fn providers(tree: &Value) -> BTreeMap<String, ProviderSummary> {
	entries(tree, "providers")
		.map(|(name, provider)| {
			let configured = provider
				.get("api_key")
				.and_then(Value::as_str)
				.is_some_and(|key| !key.is_empty());
			(name.clone(), ProviderSummary { configured })
		})
		.collect()
}

pub fn channels(tree: &Value) -> BTreeMap<String, ChannelSummary> {
	entries(tree, "channels")
		.map(|(name, channel)| {
			let enabled = channel.get("enabled").and_then(Value::as_bool).unwrap_or(false);
			(name.clone(), ChannelSummary { enabled })
		})
		.collect()
}

/// Whether the gateway has any provider it could talk to.
pub fn has_provider_key(tree: &Value) -> bool {
	providers(tree).values().any(|p| p.configured)
}

fn entries<'a>(tree: &'a Value, section: &str) -> impl Iterator<Item = (&'a String, &'a Value)> {
	tree.get(section)
		.and_then(Value::as_object)
		.into_iter()
		.flat_map(|map| map.iter())
}
