use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, LazyLock};

use bytes::BytesMut;
use regex::Regex;
use tokio::sync::Mutex;
use tokio_util::codec::Decoder;

pub const DEFAULT_LOG_LINES: usize = 500;

/// Longest line kept whole; anything longer is split into pieces of this size.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

static ANSI_ESCAPE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"\x1b\[[0-9;]*m").expect("valid ANSI pattern"));

/// Bounded buffer of the most recent gateway output lines.
///
/// Cloning is cheap and every clone shares the same buffer.
#[derive(Clone)]
pub struct LogRing {
	lines: Arc<Mutex<VecDeque<String>>>,
	capacity: usize,
}

impl LogRing {
	pub fn new(capacity: usize) -> Self {
		let capacity = capacity.max(1);
		Self {
			lines: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
			capacity,
		}
	}

	pub fn capacity(&self) -> usize {
		self.capacity
	}

	pub async fn push(&self, line: impl Into<String>) {
		let mut lines = self.lines.lock().await;
		if lines.len() >= self.capacity {
			lines.pop_front();
		}
		lines.push_back(line.into());
	}

	pub async fn snapshot(&self) -> Vec<String> {
		let lines = self.lines.lock().await;
		lines.iter().cloned().collect()
	}

	pub async fn len(&self) -> usize {
		self.lines.lock().await.len()
	}

	pub async fn is_empty(&self) -> bool {
		self.lines.lock().await.is_empty()
	}
}

impl Default for LogRing {
	fn default() -> Self {
		Self::new(DEFAULT_LOG_LINES)
	}
}

/// Decodes one raw output line for storage: lossy UTF-8, trailing
/// whitespace trimmed, color escapes removed.
pub fn clean_line(raw: &[u8]) -> String {
	let decoded = String::from_utf8_lossy(raw);
	ANSI_ESCAPE.replace_all(decoded.trim_end(), "").into_owned()
}

/// Splits gateway output into cleaned lines.
///
/// Never fails on long lines: a line without a newline after `max_len` bytes
/// is emitted in `max_len` pieces, so the read buffer stays bounded.
pub struct OutputCodec {
	/// Index of next byte to check for newline
	next_index: usize,
	max_len: usize,
}

impl OutputCodec {
	pub fn new() -> Self {
		Self::with_max_len(MAX_LINE_BYTES)
	}

	pub fn with_max_len(max_len: usize) -> Self {
		Self {
			next_index: 0,
			max_len: max_len.max(1),
		}
	}
}

impl Default for OutputCodec {
	fn default() -> Self {
		Self::new()
	}
}

impl Decoder for OutputCodec {
	type Item = String;
	type Error = io::Error;

	fn decode(&mut self, src: &mut BytesMut) -> io::Result<Option<String>> {
		// The newline itself may sit just past max_len
		let read_to = src.len().min(self.max_len + 1);
		if let Some(offset) = src[self.next_index..read_to].iter().position(|b| *b == b'\n') {
			let line = src.split_to(self.next_index + offset + 1);
			self.next_index = 0;
			return Ok(Some(clean_line(&line)));
		}

		if src.len() > self.max_len {
			let piece = src.split_to(self.max_len);
			self.next_index = 0;
			return Ok(Some(clean_line(&piece)));
		}

		self.next_index = src.len();
		Ok(None)
	}

	fn decode_eof(&mut self, src: &mut BytesMut) -> io::Result<Option<String>> {
		if let Some(line) = self.decode(src)? {
			return Ok(Some(line));
		}
		self.next_index = 0;
		if src.is_empty() {
			return Ok(None);
		}
		let rest = src.split();
		Ok(Some(clean_line(&rest)))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn decode_all(codec: &mut OutputCodec, input: &[u8]) -> Vec<String> {
		let mut buf = BytesMut::from(input);
		let mut lines = Vec::new();
		while let Some(line) = codec.decode(&mut buf).unwrap() {
			lines.push(line);
		}
		while let Some(line) = codec.decode_eof(&mut buf).unwrap() {
			lines.push(line);
		}
		lines
	}

	#[test]
	fn codec_splits_lines_and_keeps_blank_ones() {
		let mut codec = OutputCodec::new();
		assert_eq!(
			decode_all(&mut codec, b"one\n\n\x1b[32mtwo\x1b[0m\r\nthree"),
			vec!["one", "", "two", "three"]
		);
	}

	#[test]
	fn codec_waits_for_newline_across_reads() {
		let mut codec = OutputCodec::new();
		let mut buf = BytesMut::from(&b"partial"[..]);
		assert_eq!(codec.decode(&mut buf).unwrap(), None);
		buf.extend_from_slice(b" line\nnext");
		assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("partial line"));
		assert_eq!(codec.decode(&mut buf).unwrap(), None);
		assert_eq!(&buf[..], b"next");
	}

	#[test]
	fn codec_bounds_overlong_lines() {
		let mut codec = OutputCodec::with_max_len(4);
		assert_eq!(decode_all(&mut codec, b"abcdefghij\nxy\n"), vec!["abcd", "efgh", "ij", "xy"]);

		let mut codec = OutputCodec::with_max_len(4);
		let mut buf = BytesMut::new();
		let mut lines = Vec::new();
		for _ in 0..100 {
			buf.extend_from_slice(b"zzz");
			while let Some(line) = codec.decode(&mut buf).unwrap() {
				lines.push(line);
			}
			assert!(buf.len() <= 4);
		}
		assert_eq!(lines.len(), 74);
	}

	#[test]
	fn codec_keeps_line_of_exactly_max_len_whole() {
		let mut codec = OutputCodec::with_max_len(4);
		assert_eq!(decode_all(&mut codec, b"abcd\nef\n"), vec!["abcd", "ef"]);
	}

	#[tokio::test]
	async fn keeps_last_lines_in_order() {
		for k in 0..=4 {
			let ring = LogRing::new(3);
			for i in 0..(3 + k) {
				ring.push(format!("line {}", i)).await;
			}
			let expected: Vec<String> = (k..3 + k).map(|i| format!("line {}", i)).collect();
			assert_eq!(ring.snapshot().await, expected);
		}
		assert!(LogRing::new(3).is_empty().await);
	}

	#[tokio::test]
	async fn under_capacity_keeps_everything() {
		let ring = LogRing::new(DEFAULT_LOG_LINES);
		ring.push("a").await;
		ring.push("b").await;
		assert_eq!(ring.snapshot().await, vec!["a", "b"]);
		assert_eq!(ring.len().await, 2);
	}

	#[tokio::test]
	async fn snapshot_is_a_copy() {
		let ring = LogRing::new(2);
		ring.push("first").await;
		let before = ring.snapshot().await;
		ring.push("second").await;
		ring.push("third").await;
		assert_eq!(before, vec!["first"]);
		assert_eq!(ring.snapshot().await, vec!["second", "third"]);
	}

	#[tokio::test]
	async fn clones_share_storage() {
		let ring = LogRing::new(4);
		let other = ring.clone();
		other.push("shared").await;
		assert_eq!(ring.snapshot().await, vec!["shared"]);
	}

	#[test]
	fn clean_line_strips_color_codes() {
		assert_eq!(clean_line(b"\x1b[31mred\x1b[0m text\n"), "red text");
		assert_eq!(clean_line(b"\x1b[1;32mINFO\x1b[0m ready  \r\n"), "INFO ready");
		assert_eq!(clean_line(b"plain"), "plain");
	}

	#[test]
	fn clean_line_replaces_invalid_utf8() {
		assert_eq!(clean_line(b"bad \xff byte"), "bad \u{fffd} byte");
	}
}
