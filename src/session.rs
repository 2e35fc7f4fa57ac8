//! Credential session: the in-memory credential store plus the single-flight
//! token refresher.
//!
//! [`CredentialSession::authorized`] hands out a credential guaranteed to stay
//! valid for at least the configured margin, refreshing first when it would
//! not. Concurrent callers that discover a stale credential serialize on one
//! async gate; the winner performs the token-endpoint exchange and the waiters
//! re-check the slot and reuse the installed credential, so one stale window
//! produces exactly one wire call. Sessions without a refresh token fall back
//! to a guest `client_credentials` exchange, matching the upstream API's
//! public-only access mode.

mod metrics;

pub use metrics::RefreshMetrics;

// self
use crate::{
	_prelude::*,
	auth::{Credential, ScopeSet, TokenSecret},
	decode,
	error::{ConfigError, TransientError},
	obs::{self, CallKind, CallOutcome, RequestSpan},
	transport::{self, ApiTransport, Method, WireBody, WireRequest},
};

/// Callback invoked with the new credential after every successful refresh.
pub type UpdateHook = Box<dyn Fn(&Credential) + Send + Sync>;

/// Shape of a successful token-endpoint response.
#[derive(Debug, Deserialize)]
struct TokenGrant {
	#[serde(default = "default_token_type")]
	token_type: String,
	access_token: String,
	#[serde(default)]
	refresh_token: Option<String>,
	expires_in: i64,
}

fn default_token_type() -> String {
	"Bearer".into()
}

/// Owns one credential and its refresh lifecycle against one token endpoint.
pub struct CredentialSession<T>
where
	T: ?Sized + ApiTransport,
{
	transport: Arc<T>,
	token_endpoint: Url,
	client_id: String,
	client_secret: TokenSecret,
	refresh_margin: Duration,
	guest_scopes: ScopeSet,
	credential: RwLock<Option<Credential>>,
	refresh_gate: AsyncMutex<()>,
	update_hook: Mutex<Option<UpdateHook>>,
	metrics: Arc<RefreshMetrics>,
}
impl<T> CredentialSession<T>
where
	T: ?Sized + ApiTransport,
{
	const DEFAULT_REFRESH_MARGIN: Duration = Duration::seconds(30);

	/// Creates a session for the provided API base URL and client credentials.
	///
	/// The token endpoint is derived as `oauth/token` under the base URL. The
	/// session starts without a credential; the first [`authorized`](Self::authorized)
	/// call performs a guest exchange unless a credential is seeded via
	/// [`with_credential`](Self::with_credential).
	pub fn new(
		transport: impl Into<Arc<T>>,
		base_url: &Url,
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
	) -> Result<Self> {
		Ok(Self {
			transport: transport.into(),
			token_endpoint: transport::join_route(base_url, "oauth/token")?,
			client_id: client_id.into(),
			client_secret: TokenSecret::new(client_secret),
			refresh_margin: Self::DEFAULT_REFRESH_MARGIN,
			guest_scopes: ScopeSet::public(),
			credential: RwLock::new(None),
			refresh_gate: AsyncMutex::new(()),
			update_hook: Mutex::new(None),
			metrics: Default::default(),
		})
	}

	/// Seeds the session with an existing credential.
	pub fn with_credential(self, credential: Credential) -> Self {
		self.replace(credential);

		self
	}

	/// Installs a caller-supplied credential, replacing any stored one.
	///
	/// Meant for credentials restored from external storage; refreshed
	/// credentials install through the refresh path, which also enforces the
	/// forward-only expiry invariant.
	pub fn replace(&self, credential: Credential) {
		*self.credential.write() = Some(credential);
	}

	/// Overrides the freshness margin (defaults to 30 seconds).
	pub fn with_refresh_margin(mut self, margin: Duration) -> Self {
		self.refresh_margin = if margin.is_negative() { Duration::ZERO } else { margin };

		self
	}

	/// Overrides the scopes requested by guest exchanges (defaults to `public`).
	pub fn with_guest_scopes(mut self, scopes: ScopeSet) -> Self {
		self.guest_scopes = scopes;

		self
	}

	/// Registers the callback invoked after every successful refresh.
	///
	/// Useful for persisting rotated refresh tokens outside the process.
	pub fn on_update(&self, hook: impl Fn(&Credential) + Send + Sync + 'static) {
		*self.update_hook.lock() = Some(Box::new(hook));
	}

	/// Returns the transport shared with the pipeline.
	pub fn transport(&self) -> Arc<T> {
		self.transport.clone()
	}

	/// Snapshot of the stored credential, if any.
	pub fn credential(&self) -> Option<Credential> {
		self.credential.read().clone()
	}

	/// Drops the stored credential.
	pub fn clear(&self) {
		*self.credential.write() = None;
	}

	/// Shared refresh counters.
	pub fn metrics(&self) -> Arc<RefreshMetrics> {
		self.metrics.clone()
	}

	/// The configured freshness margin.
	pub fn refresh_margin(&self) -> Duration {
		self.refresh_margin
	}

	/// Returns a credential valid for at least the freshness margin,
	/// refreshing first when the stored one is stale or absent.
	pub async fn authorized(&self) -> Result<Credential> {
		if let Some(credential) = self.fresh_snapshot(OffsetDateTime::now_utc()) {
			return Ok(credential);
		}

		self.refresh_inner(false).await
	}

	/// Forces a token-endpoint exchange regardless of the stored credential.
	pub async fn refresh(&self) -> Result<Credential> {
		self.refresh_inner(true).await
	}

	fn fresh_snapshot(&self, now: OffsetDateTime) -> Option<Credential> {
		self.credential
			.read()
			.as_ref()
			.filter(|credential| credential.is_fresh_at(now, self.refresh_margin))
			.cloned()
	}

	async fn refresh_inner(&self, force: bool) -> Result<Credential> {
		const KIND: CallKind = CallKind::Refresh;

		let span = RequestSpan::new(KIND, "refresh");

		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		let result = span.instrument(self.refresh_locked(force)).await;

		match &result {
			Ok(_) => obs::record_call_outcome(KIND, CallOutcome::Success),
			Err(_) => obs::record_call_outcome(KIND, CallOutcome::Failure),
		}

		result
	}

	async fn refresh_locked(&self, force: bool) -> Result<Credential> {
		self.metrics.record_attempt();

		let _gate = self.refresh_gate.lock().await;

		// A concurrent winner may have refreshed while this caller waited on
		// the gate; reuse its result instead of spending the rotated token.
		if !force {
			if let Some(credential) = self.fresh_snapshot(OffsetDateTime::now_utc()) {
				self.metrics.record_reuse();

				return Ok(credential);
			}
		}

		let previous = self.credential.read().clone();
		let refresh_token = previous.as_ref().and_then(|credential| credential.refresh_token.clone());
		let form = match &refresh_token {
			Some(token) => refresh_grant_form(&self.client_id, &self.client_secret, token),
			None => guest_grant_form(&self.client_id, &self.client_secret, &self.guest_scopes),
		};
		let request = WireRequest {
			method: Method::Post,
			url: self.token_endpoint.clone(),
			bearer: None,
			body: WireBody::Form(form),
		};
		let response = self.transport.send(request).await.map_err(|failure| {
			self.metrics.record_failure();

			Error::Transient(failure.into())
		})?;

		self.metrics.record_exchange();

		if !response.is_success() {
			self.metrics.record_failure();

			return Err(match response.status {
				status @ (429 | 500..=599) => TransientError::Upstream {
					status,
					message: crate::error::preview(&response.body),
					retry_after: response.retry_after,
				}
				.into(),
				status => Error::AuthExpired {
					reason: format!(
						"token endpoint rejected the grant with status {status}: {}",
						crate::error::RequestError::from_body(status, &response.body).message,
					),
				},
			});
		}

		let grant = decode::from_slice::<TokenGrant>(&response.body).map_err(|err| {
			self.metrics.record_failure();

			Error::from(err)
		})?;

		if grant.expires_in <= 0 {
			self.metrics.record_failure();

			return Err(ConfigError::NonPositiveExpiresIn.into());
		}

		let now = OffsetDateTime::now_utc();
		let scopes = match &previous {
			Some(credential) if credential.can_refresh() => credential.scopes.clone(),
			_ => self.guest_scopes.clone(),
		};
		let mut builder = Credential::builder()
			.token_type(grant.token_type)
			.access_token(grant.access_token)
			.scopes(scopes)
			.issued_at(now)
			.expires_in(Duration::seconds(grant.expires_in));

		// Carry the previous refresh token forward when the server does not
		// rotate it, so the session stays refreshable.
		if let Some(token) =
			grant.refresh_token.or_else(|| refresh_token.map(|t| t.expose().to_owned()))
		{
			builder = builder.refresh_token(token);
		}

		let credential = builder.build().map_err(|err| {
			self.metrics.record_failure();

			Error::from(ConfigError::from(err))
		})?;

		Ok(self.install(credential))
	}

	fn install(&self, mut fresh: Credential) -> Credential {
		{
			let mut slot = self.credential.write();

			if let Some(current) = slot.as_ref() {
				// expires_at only moves forward; a shorter-lived grant keeps the
				// previous horizon so freshness checks never regress.
				if fresh.expires_at < current.expires_at {
					fresh.expires_at = current.expires_at;
				}
			}

			*slot = Some(fresh.clone());
		}

		if let Some(hook) = self.update_hook.lock().as_ref() {
			hook(&fresh);
		}

		fresh
	}
}
impl<T> Debug for CredentialSession<T>
where
	T: ?Sized + ApiTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialSession")
			.field("token_endpoint", &self.token_endpoint.as_str())
			.field("client_id", &self.client_id)
			.field("credential_set", &self.credential.read().is_some())
			.finish()
	}
}

fn refresh_grant_form(
	client_id: &str,
	client_secret: &TokenSecret,
	refresh_token: &TokenSecret,
) -> Vec<(String, String)> {
	vec![
		("client_id".into(), client_id.into()),
		("client_secret".into(), client_secret.expose().into()),
		("grant_type".into(), "refresh_token".into()),
		("refresh_token".into(), refresh_token.expose().into()),
	]
}

fn guest_grant_form(
	client_id: &str,
	client_secret: &TokenSecret,
	scopes: &ScopeSet,
) -> Vec<(String, String)> {
	vec![
		("client_id".into(), client_id.into()),
		("client_secret".into(), client_secret.expose().into()),
		("grant_type".into(), "client_credentials".into()),
		("scope".into(), scopes.normalized()),
	]
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicBool, Ordering};
	// self
	use super::*;
	use crate::transport::{TransportFailure, TransportFuture};

	struct DeadTransport;
	impl ApiTransport for DeadTransport {
		fn send(&self, _: WireRequest) -> TransportFuture<'_> {
			Box::pin(async { Err(TransportFailure::not_sent(std::io::Error::other("unused"))) })
		}
	}

	fn session() -> CredentialSession<DeadTransport> {
		CredentialSession::new(
			DeadTransport,
			&Url::parse("https://osu.ppy.sh").expect("Base URL fixture should parse."),
			"client-1",
			"secret-1",
		)
		.expect("Session fixture should build.")
	}

	fn credential(ttl: Duration) -> Credential {
		Credential::builder()
			.access_token("access")
			.refresh_token("refresh")
			.expires_in(ttl)
			.build()
			.expect("Credential fixture should build.")
	}

	#[test]
	fn token_endpoint_derives_from_base_url() {
		assert_eq!(session().token_endpoint.as_str(), "https://osu.ppy.sh/oauth/token");
	}

	#[test]
	fn grant_forms_carry_expected_fields() {
		let secret = TokenSecret::new("s3cr3t");
		let refresh = refresh_grant_form("42", &secret, &TokenSecret::new("rt-1"));

		assert!(refresh.contains(&("grant_type".into(), "refresh_token".into())));
		assert!(refresh.contains(&("refresh_token".into(), "rt-1".into())));

		let guest = guest_grant_form("42", &secret, &ScopeSet::public());

		assert!(guest.contains(&("grant_type".into(), "client_credentials".into())));
		assert!(guest.contains(&("scope".into(), "public".into())));
	}

	#[test]
	fn install_never_rolls_expiry_backward() {
		let session = session().with_credential(credential(Duration::hours(2)));
		let horizon = session.credential().expect("Seed credential should be set.").expires_at;
		let installed = session.install(credential(Duration::minutes(5)));

		assert!(installed.expires_at >= horizon);
		assert!(
			session.credential().expect("Credential should remain set.").expires_at >= horizon,
		);
	}

	#[test]
	fn install_notifies_update_hook() {
		let session = session();
		let fired = Arc::new(AtomicBool::new(false));
		let observed = fired.clone();

		session.on_update(move |credential| {
			assert_eq!(credential.access_token.expose(), "access");
			observed.store(true, Ordering::SeqCst);
		});
		session.install(credential(Duration::hours(1)));

		assert!(fired.load(Ordering::SeqCst));
	}

	#[test]
	fn freshness_margin_gates_snapshots() {
		{
			let session =
				session().with_refresh_margin(Duration::seconds(30)).with_credential(credential(
					Duration::seconds(10),
				));

			assert!(session.fresh_snapshot(OffsetDateTime::now_utc()).is_none());
		}

		{
			let session =
				session().with_refresh_margin(Duration::seconds(30)).with_credential(credential(
					Duration::hours(1),
				));

			assert!(session.fresh_snapshot(OffsetDateTime::now_utc()).is_some());
		}
	}
}
