//! Logical API call descriptions and the payloads they resolve to.

// self
use crate::{
	_prelude::*,
	auth::ScopeSet,
	transport::{self, Method, RawResponse, WireBody},
};

/// Limiter class a call charges its grant against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallClass {
	/// Read endpoints; share the main limiter.
	Read,
	/// Mutating endpoints; use the write limiter when one is attached.
	Write,
}

/// Replay policy after an ambiguous connection-level failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Replay {
	/// Derive from the method: only read methods are replayed.
	Auto,
	/// Always replay, even when the server may have processed the request.
	Always,
	/// Never replay after an ambiguous failure.
	Never,
}

/// One logical API call flowing through the pipeline.
///
/// Routes are relative to the pipeline's base URL and include the API prefix,
/// e.g. `api/v2/users/2`.
#[derive(Clone, Debug)]
pub struct ApiCall {
	method: Method,
	route: String,
	query: Vec<(String, String)>,
	body: WireBody,
	class: CallClass,
	replay: Replay,
	required_scopes: ScopeSet,
	any_scope: bool,
}
impl ApiCall {
	fn new(method: Method, route: impl Into<String>) -> Self {
		Self {
			method,
			route: route.into(),
			query: Vec::new(),
			body: WireBody::Empty,
			class: if method.is_read() { CallClass::Read } else { CallClass::Write },
			replay: Replay::Auto,
			required_scopes: ScopeSet::default(),
			any_scope: false,
		}
	}

	/// Read a resource.
	pub fn get(route: impl Into<String>) -> Self {
		Self::new(Method::Get, route)
	}

	/// Create a resource or submit a form.
	pub fn post(route: impl Into<String>) -> Self {
		Self::new(Method::Post, route)
	}

	/// Replace a resource.
	pub fn put(route: impl Into<String>) -> Self {
		Self::new(Method::Put, route)
	}

	/// Partially update a resource.
	pub fn patch(route: impl Into<String>) -> Self {
		Self::new(Method::Patch, route)
	}

	/// Remove a resource.
	pub fn delete(route: impl Into<String>) -> Self {
		Self::new(Method::Delete, route)
	}

	/// Appends one query parameter.
	pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.query.push((key.into(), value.into()));

		self
	}

	/// Attaches a JSON body.
	pub fn json_body(mut self, value: serde_json::Value) -> Self {
		self.body = WireBody::Json(value);

		self
	}

	/// Attaches a form-encoded body.
	pub fn form_body(mut self, pairs: impl IntoIterator<Item = (String, String)>) -> Self {
		self.body = WireBody::Form(pairs.into_iter().collect());

		self
	}

	/// Overrides the replay policy (defaults to [`Replay::Auto`]).
	pub fn with_replay(mut self, replay: Replay) -> Self {
		self.replay = replay;

		self
	}

	/// Overrides the limiter class (defaults to the method's class).
	pub fn with_class(mut self, class: CallClass) -> Self {
		self.class = class;

		self
	}

	/// Requires every scope in `scopes` to be held by the credential.
	pub fn require_all(mut self, scopes: ScopeSet) -> Self {
		self.required_scopes = scopes;
		self.any_scope = false;

		self
	}

	/// Requires at least one scope in `scopes` to be held by the credential.
	pub fn require_any(mut self, scopes: ScopeSet) -> Self {
		self.required_scopes = scopes;
		self.any_scope = true;

		self
	}

	/// The call's HTTP method.
	pub fn method(&self) -> Method {
		self.method
	}

	/// The call's route, relative to the pipeline base URL.
	pub fn route(&self) -> &str {
		&self.route
	}

	/// The call's limiter class.
	pub fn class(&self) -> CallClass {
		self.class
	}

	pub(crate) fn wire_body(&self) -> WireBody {
		self.body.clone()
	}

	pub(crate) fn replayable(&self) -> bool {
		match self.replay {
			Replay::Auto => self.method.is_read(),
			Replay::Always => true,
			Replay::Never => false,
		}
	}

	/// Returns the required scope set when `held` does not satisfy the guard.
	pub(crate) fn missing_scopes(&self, held: &ScopeSet) -> Option<ScopeSet> {
		if self.required_scopes.is_empty() {
			return None;
		}

		let satisfied = if self.any_scope {
			held.intersects(&self.required_scopes)
		} else {
			held.contains_all(&self.required_scopes)
		};

		if satisfied { None } else { Some(self.required_scopes.clone()) }
	}

	/// Resolves the absolute URL for this call under `base`.
	pub(crate) fn resolve_url(&self, base: &Url) -> Result<Url> {
		let mut url = transport::join_route(base, &self.route)?;

		if !self.query.is_empty() {
			url.query_pairs_mut().extend_pairs(self.query.iter());
		}

		Ok(url)
	}
}

/// Successful response payload handed to the decoder.
#[derive(Clone, Debug)]
pub struct Payload {
	/// HTTP status of the response.
	pub status: u16,
	/// `Content-Type` of the response, when the server sent one.
	pub content_type: Option<String>,
	body: Vec<u8>,
}
impl Payload {
	pub(crate) fn from_response(response: RawResponse) -> Self {
		Self { status: response.status, content_type: response.content_type, body: response.body }
	}

	/// Returns `true` when the server declared a JSON body.
	pub fn is_json(&self) -> bool {
		self.content_type.as_deref() == Some("application/json")
	}

	/// Borrows the body bytes.
	pub fn bytes(&self) -> &[u8] {
		&self.body
	}

	/// Consumes the payload and returns the body bytes, e.g. for replay files.
	pub fn into_bytes(self) -> Vec<u8> {
		self.body
	}
}
