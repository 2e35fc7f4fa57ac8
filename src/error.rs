//! Pipeline-level error types shared across the session, limiter, and transport layers.

// self
use crate::{_prelude::*, auth::ScopeSet};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Boxed error used for transport-specific failure sources.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical pipeline error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Refresh token itself was rejected; the session cannot recover without new credentials.
	#[error("Authorization is no longer refreshable: {reason}.")]
	AuthExpired {
		/// Server- or pipeline-supplied reason string.
		reason: String,
	},
	/// The stored credential lacks scopes the call declared as required.
	#[error("Credential is missing the required scopes: {required}.")]
	MissingScopes {
		/// Scopes the call required but the credential does not hold.
		required: ScopeSet,
	},
	/// Local or server-side throttling outlived the retry budget.
	#[error("Rate limit budget exhausted after {attempts} attempt(s).")]
	RateLimitExceeded {
		/// Wire attempts made before giving up.
		attempts: u32,
		/// Retry-After hint from the last throttled response, if supplied.
		retry_after: Option<Duration>,
	},
	/// Temporary upstream or network failure that outlived the retry budget.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Non-retryable 4xx rejection.
	#[error(transparent)]
	Request(#[from] RequestError),
	/// Response payload did not match the expected shape.
	#[error(transparent)]
	Decode(#[from] DecodeError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
}

/// Temporary failure variants surfaced after the retry budget is spent.
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Upstream answered with a retryable status (5xx) until the budget ran out.
	#[error("Upstream kept failing with status {status}: {message}.")]
	Upstream {
		/// Last HTTP status observed.
		status: u16,
		/// Body-derived summary of the last failure.
		message: String,
		/// Retry-After hint from the last response, if supplied.
		retry_after: Option<Duration>,
	},
	/// Connection-level failure reported by the transport.
	#[error("Network failure while dispatching the request.")]
	Network {
		/// Transport-specific failure.
		#[source]
		source: BoxError,
		/// Whether the server may have processed the request before the failure.
		ambiguous: bool,
	},
}

/// Non-retryable rejection carrying the status and body for diagnostics.
#[derive(Debug, ThisError)]
#[error("Request was rejected with status {status}: {message}.")]
pub struct RequestError {
	/// HTTP status returned by the server.
	pub status: u16,
	/// The `error` field of the response body, or a body preview when absent.
	pub message: String,
	/// Raw body preview retained for diagnostics.
	pub body: String,
}
impl RequestError {
	/// Builds a rejection from a raw body, preferring the JSON `error` field as the message.
	pub fn from_body(status: u16, body: &[u8]) -> Self {
		let preview = preview(body);
		let message = serde_json::from_slice::<serde_json::Value>(body)
			.ok()
			.and_then(|value| value.get("error").and_then(|err| err.as_str().map(str::to_owned)))
			.filter(|msg| !msg.is_empty())
			.unwrap_or_else(|| preview.clone());

		Self { status, message, body: preview }
	}
}

/// Malformed response payload, with the failing path and a raw preview.
#[derive(Debug, ThisError)]
#[error("Response body did not match the expected shape at `{}`.", .source.path())]
pub struct DecodeError {
	/// Structured parsing failure naming the mismatched field.
	#[source]
	pub source: serde_path_to_error::Error<serde_json::Error>,
	/// Raw body preview retained for diagnostics.
	pub body_preview: String,
}

/// Configuration and validation failures raised before any request is dispatched.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Base URL cannot be extended with the requested route.
	#[error("Base URL cannot be extended with route `{route}`.")]
	InvalidRoute {
		/// Route the caller supplied.
		route: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Token endpoint returned a non-positive token lifetime.
	#[error("The expires_in value must be positive.")]
	NonPositiveExpiresIn,
	/// Rate limiter configuration was rejected.
	#[error(transparent)]
	Limiter(#[from] crate::limit::LimiterConfigError),
	/// Credential builder validation failed.
	#[error("Unable to build credential.")]
	Credential(#[from] crate::auth::CredentialBuilderError),
	/// A scope string could not be parsed.
	#[error("Requested scopes are invalid.")]
	Scope(#[from] crate::auth::ScopeParseError),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Truncates a body to a short lossy-UTF-8 preview for error payloads.
pub(crate) fn preview(body: &[u8]) -> String {
	const LIMIT: usize = 256;

	let text = String::from_utf8_lossy(body);

	match text.char_indices().nth(LIMIT) {
		Some((idx, _)) => format!("{}…", &text[..idx]),
		None => text.into_owned(),
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn request_error_prefers_json_error_field() {
		let err = RequestError::from_body(404, br#"{"error":"Specified user couldn't be found."}"#);

		assert_eq!(err.status, 404);
		assert_eq!(err.message, "Specified user couldn't be found.");
		assert!(err.to_string().contains("404"));
	}

	#[test]
	fn request_error_falls_back_to_body_preview() {
		let err = RequestError::from_body(422, b"not json at all");

		assert_eq!(err.message, "not json at all");
	}

	#[test]
	fn preview_truncates_long_bodies() {
		let body = "x".repeat(1000);
		let shortened = preview(body.as_bytes());

		assert!(shortened.chars().count() <= 257);
		assert!(shortened.ends_with('…'));
	}
}
