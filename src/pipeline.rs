//! Request pipeline composing rate limiting, authorization, dispatch, and retries.

pub mod call;
pub mod retry;

mod execute;

pub use call::*;
pub use retry::*;

// self
use crate::{
	_prelude::*,
	limit::{LimiterConfig, SlidingWindowLimiter},
	session::CredentialSession,
	transport::ApiTransport,
};
#[cfg(feature = "reqwest")]
use crate::{error::ConfigError, transport::ReqwestTransport};

#[cfg(feature = "reqwest")]
/// Pipeline specialized for the crate's default reqwest transport.
pub type ReqwestPipeline = RequestPipeline<ReqwestTransport>;

/// Executes logical API calls against one base URL.
///
/// The pipeline owns the retry policy and the rate limiters, and shares the
/// transport and credential session so every call flows through the same
/// throttling and authorization gates. Cloning is cheap; clones share all
/// limiter and session state.
pub struct RequestPipeline<T>
where
	T: ?Sized + ApiTransport,
{
	transport: Arc<T>,
	session: Arc<CredentialSession<T>>,
	base_url: Url,
	limiter: Arc<SlidingWindowLimiter>,
	write_limiter: Option<Arc<SlidingWindowLimiter>>,
	retry: RetryPolicy,
}
impl<T> RequestPipeline<T>
where
	T: ?Sized + ApiTransport,
{
	/// Creates a pipeline over the provided session and base URL.
	///
	/// Defaults: the osu! v2 limiter budget (1200/60s), one shared limiter for
	/// reads and writes, and [`RetryPolicy::default`].
	pub fn new(session: impl Into<Arc<CredentialSession<T>>>, base_url: Url) -> Self {
		let session = session.into();

		Self {
			transport: session.transport(),
			session,
			base_url,
			limiter: Arc::new(SlidingWindowLimiter::new(LimiterConfig::osu_default())),
			write_limiter: None,
			retry: RetryPolicy::default(),
		}
	}

	/// Replaces the shared limiter.
	pub fn with_limiter(mut self, limiter: impl Into<Arc<SlidingWindowLimiter>>) -> Self {
		self.limiter = limiter.into();

		self
	}

	/// Attaches a separate limiter for mutating calls.
	pub fn with_write_limiter(mut self, limiter: impl Into<Arc<SlidingWindowLimiter>>) -> Self {
		self.write_limiter = Some(limiter.into());

		self
	}

	/// Replaces the retry policy.
	pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
		self.retry = retry;

		self
	}

	/// The credential session backing this pipeline.
	pub fn session(&self) -> &Arc<CredentialSession<T>> {
		&self.session
	}

	/// The base URL calls are resolved against.
	pub fn base_url(&self) -> &Url {
		&self.base_url
	}

	/// The active retry policy.
	pub fn retry_policy(&self) -> &RetryPolicy {
		&self.retry
	}

	pub(crate) fn limiter_for(&self, class: CallClass) -> &SlidingWindowLimiter {
		match class {
			CallClass::Read => &self.limiter,
			CallClass::Write => self.write_limiter.as_deref().unwrap_or(&self.limiter),
		}
	}
}
#[cfg(feature = "reqwest")]
impl RequestPipeline<ReqwestTransport> {
	/// Production osu! API base URL.
	pub const OSU_BASE_URL: &'static str = "https://osu.ppy.sh";

	/// Creates a pipeline against the production osu! API with a default
	/// reqwest transport and a fresh guest session.
	pub fn osu(client_id: impl Into<String>, client_secret: impl Into<String>) -> Result<Self> {
		let base_url = Url::parse(Self::OSU_BASE_URL).map_err(|source| {
			ConfigError::InvalidRoute { route: Self::OSU_BASE_URL.into(), source }
		})?;
		let session =
			CredentialSession::new(ReqwestTransport::default(), &base_url, client_id, client_secret)?;

		Ok(Self::new(session, base_url))
	}
}
impl<T> Clone for RequestPipeline<T>
where
	T: ?Sized + ApiTransport,
{
	fn clone(&self) -> Self {
		Self {
			transport: self.transport.clone(),
			session: self.session.clone(),
			base_url: self.base_url.clone(),
			limiter: self.limiter.clone(),
			write_limiter: self.write_limiter.clone(),
			retry: self.retry,
		}
	}
}
impl<T> Debug for RequestPipeline<T>
where
	T: ?Sized + ApiTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RequestPipeline")
			.field("base_url", &self.base_url.as_str())
			.field("retry", &self.retry)
			.field("write_limiter_set", &self.write_limiter.is_some())
			.finish()
	}
}
