use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use subtle::ConstantTimeEq;

use super::api::AppState;

pub const REALM: &str = "nanobot";

#[derive(Debug, Clone)]
pub struct Credentials {
	pub username: String,
	pub password: String,
}

impl Credentials {
	/// Both halves are always compared so timing does not reveal which one
	/// was wrong.
	pub fn matches(&self, username: &str, password: &str) -> bool {
		let user_ok = username.as_bytes().ct_eq(self.username.as_bytes());
		let pass_ok = password.as_bytes().ct_eq(self.password.as_bytes());
		bool::from(user_ok & pass_ok)
	}
}

/// `Authorization: Basic <base64(user:pass)>` → `(user, pass)`.
pub fn parse_basic(headers: &HeaderMap) -> Option<(String, String)> {
	let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
	let (scheme, encoded) = value.trim().split_once(' ')?;
	if !scheme.eq_ignore_ascii_case("basic") {
		return None;
	}
	let decoded = STANDARD.decode(encoded.trim()).ok()?;
	let decoded = String::from_utf8(decoded).ok()?;
	let (username, password) = decoded.split_once(':')?;
	Some((username.to_string(), password.to_string()))
}

pub async fn require_auth(State(state): State<AppState>, request: Request<Body>, next: Next) -> Response {
	match parse_basic(request.headers()) {
		Some((username, password)) if state.credentials.matches(&username, &password) => next.run(request).await,
		_ => unauthorized(),
	}
}

fn unauthorized() -> Response {
	(
		StatusCode::UNAUTHORIZED,
		[(header::WWW_AUTHENTICATE, format!("Basic realm=\"{}\"", REALM))],
		"Unauthorized",
	)
		.into_response()
}
