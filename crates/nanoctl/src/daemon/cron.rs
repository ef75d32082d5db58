use std::path::Path;

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Serialize)]
pub struct CronSummary {
	pub count: usize,
	pub jobs: Vec<Value>,
}

/// Every `*.json` job file in `dir` that parses. Unreadable files are skipped.
pub fn list_jobs(dir: &Path) -> CronSummary {
	let mut files: Vec<_> = match std::fs::read_dir(dir) {
		Ok(entries) => entries
			.filter_map(|e| e.ok())
			.map(|e| e.path())
			.filter(|p| p.extension().is_some_and(|ext| ext == "json"))
			.collect(),
		Err(_) => Vec::new(),
	};
	files.sort();

	let jobs: Vec<Value> = files
		.iter()
		.filter_map(|path| {
			let content = std::fs::read_to_string(path).ok()?;
			match serde_json::from_str(&content) {
				Ok(job) => Some(job),
				Err(e) => {
					tracing::debug!(path = %path.display(), error = %e, "skipping cron file");
					None
				}
			}
		})
		.collect();

	CronSummary {
		count: jobs.len(),
		jobs,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn lists_parseable_json_files() {
		let dir = std::env::temp_dir().join(format!("nanoctl-cron-{}", std::process::id()));
		let _ = std::fs::remove_dir_all(&dir);
		std::fs::create_dir_all(&dir).unwrap();
		std::fs::write(dir.join("a.json"), r#"{"id":"a","schedule":"0 9 * * *"}"#).unwrap();
		std::fs::write(dir.join("b.json"), r#"{"id":"b"}"#).unwrap();
		std::fs::write(dir.join("broken.json"), "{").unwrap();
		std::fs::write(dir.join("notes.txt"), "{}").unwrap();

		let summary = list_jobs(&dir);
		assert_eq!(summary.count, 2);
		assert_eq!(summary.jobs, vec![json!({"id":"a","schedule":"0 9 * * *"}), json!({"id":"b"})]);
	}

	#[test]
	fn missing_dir_is_empty() {
		let summary = list_jobs(Path::new("/nonexistent/nanoctl/cron"));
		assert_eq!(summary.count, 0);
		assert!(summary.jobs.is_empty());
	}
}
