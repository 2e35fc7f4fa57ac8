//! Transport primitives for dispatching API calls.
//!
//! [`ApiTransport`] is the pipeline's only dependency on an HTTP stack. The
//! default [`ReqwestTransport`] sits behind the `reqwest` feature; tests and
//! downstream crates plug custom transports through the same trait. Transport
//! failures carry a dispatch classification so the pipeline can tell failures
//! that never reached the server apart from ambiguous ones, which drives the
//! replay policy for mutating calls.

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	error::{BoxError, ConfigError},
};
#[cfg(feature = "reqwest")]
use {
	reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, RETRY_AFTER},
	time::format_description::well_known::Rfc2822,
};

/// HTTP methods the pipeline dispatches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
	/// Read a resource.
	Get,
	/// Create a resource or submit a form.
	Post,
	/// Replace a resource.
	Put,
	/// Partially update a resource.
	Patch,
	/// Remove a resource.
	Delete,
}
impl Method {
	/// Returns the wire name of the method.
	pub const fn as_str(self) -> &'static str {
		match self {
			Method::Get => "GET",
			Method::Post => "POST",
			Method::Put => "PUT",
			Method::Patch => "PATCH",
			Method::Delete => "DELETE",
		}
	}

	/// Returns `true` for read-only methods that are always safe to replay.
	pub const fn is_read(self) -> bool {
		matches!(self, Method::Get)
	}
}
impl Display for Method {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Body attached to a [`WireRequest`].
#[derive(Clone, Debug)]
pub enum WireBody {
	/// No body.
	Empty,
	/// `application/x-www-form-urlencoded` key/value pairs.
	Form(Vec<(String, String)>),
	/// JSON document.
	Json(serde_json::Value),
}

/// One fully-resolved HTTP request handed to the transport.
#[derive(Clone, Debug)]
pub struct WireRequest {
	/// HTTP method.
	pub method: Method,
	/// Fully-resolved URL including query parameters.
	pub url: Url,
	/// Access token attached as a `Bearer` authorization header, when present.
	pub bearer: Option<TokenSecret>,
	/// Request body.
	pub body: WireBody,
}

/// Raw response handed back by the transport.
#[derive(Clone, Debug)]
pub struct RawResponse {
	/// HTTP status code.
	pub status: u16,
	/// `Content-Type` header value, when present.
	pub content_type: Option<String>,
	/// `Retry-After` hint expressed as a relative duration, when present.
	pub retry_after: Option<Duration>,
	/// Body bytes.
	pub body: Vec<u8>,
}
impl RawResponse {
	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}
}

/// Whether a failed request may have been processed by the server.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatch {
	/// The request never left this process; replaying is always safe.
	NotSent,
	/// The outcome is unknown; the server may have processed the request.
	Ambiguous,
}

/// Connection-level failure reported by a transport.
#[derive(Debug)]
pub struct TransportFailure {
	/// Dispatch classification driving the replay policy.
	pub dispatch: Dispatch,
	/// Transport-specific failure.
	pub source: BoxError,
}
impl TransportFailure {
	/// Builds a failure for a request that never left this process.
	pub fn not_sent(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self { dispatch: Dispatch::NotSent, source: Box::new(src) }
	}

	/// Builds a failure whose outcome on the server is unknown.
	pub fn ambiguous(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self { dispatch: Dispatch::Ambiguous, source: Box::new(src) }
	}

	/// Returns `true` when the server may have processed the request.
	pub fn is_ambiguous(&self) -> bool {
		matches!(self.dispatch, Dispatch::Ambiguous)
	}
}
impl From<TransportFailure> for crate::error::TransientError {
	fn from(failure: TransportFailure) -> Self {
		Self::Network { ambiguous: failure.is_ambiguous(), source: failure.source }
	}
}

/// Boxed future returned by [`ApiTransport::send`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<RawResponse, TransportFailure>> + 'a + Send>>;

/// Abstraction over HTTP stacks capable of dispatching pipeline requests.
///
/// Implementations must be `Send + Sync + 'static` so one transport can back a
/// session and a pipeline concurrently behind `Arc<T>`, and the returned
/// futures must be `Send` so pipeline calls can hop executor threads.
pub trait ApiTransport
where
	Self: 'static + Send + Sync,
{
	/// Dispatches one request and resolves with the raw response.
	fn send(&self, request: WireRequest) -> TransportFuture<'_>;
}

/// Joins a route onto a base URL, tolerating missing trailing slashes on the base
/// and leading slashes on the route.
pub(crate) fn join_route(base: &Url, route: &str) -> Result<Url, ConfigError> {
	let trimmed = route.trim_start_matches('/');
	let mut base = base.clone();

	if !base.path().ends_with('/') {
		let path = format!("{}/", base.path());

		base.set_path(&path);
	}

	base.join(trimmed)
		.map_err(|source| ConfigError::InvalidRoute { route: route.to_owned(), source })
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	fn build(&self, request: &WireRequest) -> Result<reqwest::Request, ReqwestError> {
		let method = match request.method {
			Method::Get => reqwest::Method::GET,
			Method::Post => reqwest::Method::POST,
			Method::Put => reqwest::Method::PUT,
			Method::Patch => reqwest::Method::PATCH,
			Method::Delete => reqwest::Method::DELETE,
		};
		let mut builder =
			self.0.request(method, request.url.clone()).header(ACCEPT, "application/json");

		if let Some(bearer) = &request.bearer {
			builder = builder.header(AUTHORIZATION, bearer.bearer());
		}

		builder = match &request.body {
			WireBody::Empty => builder,
			WireBody::Form(pairs) => builder.form(pairs),
			WireBody::Json(value) => builder.json(value),
		};

		builder.build()
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl ApiTransport for ReqwestTransport {
	fn send(&self, request: WireRequest) -> TransportFuture<'_> {
		Box::pin(async move {
			// Build failures never reach the wire; everything after execute() is
			// ambiguous because the server may have seen the request.
			let built = self.build(&request).map_err(TransportFailure::not_sent)?;
			let response = self.0.execute(built).await.map_err(|err| {
				if err.is_connect() {
					TransportFailure::not_sent(err)
				} else {
					TransportFailure::ambiguous(err)
				}
			})?;
			let status = response.status().as_u16();
			let headers = response.headers().to_owned();
			let body =
				response.bytes().await.map_err(TransportFailure::ambiguous)?.to_vec();

			Ok(RawResponse {
				status,
				content_type: content_type(&headers),
				retry_after: parse_retry_after(&headers),
				body,
			})
		})
	}
}

#[cfg(feature = "reqwest")]
fn content_type(headers: &HeaderMap) -> Option<String> {
	let value = headers.get(reqwest::header::CONTENT_TYPE)?.to_str().ok()?;

	// Strip parameters such as `; charset=utf-8`.
	Some(value.split(';').next().unwrap_or(value).trim().to_owned())
}

#[cfg(feature = "reqwest")]
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u64>() {
		return Some(Duration::seconds(secs as i64));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}
