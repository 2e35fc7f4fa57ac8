//! The per-call state machine: limit, authorize, dispatch, retry.
//!
//! Each wire attempt walks the rate-limit wait, auth check, and in-flight
//! stages, and ends in success, a backoff-then-retry, or a terminal failure.
//! Every attempt consumes exactly one limiter grant, recorded at acquisition,
//! so abandoned calls never charge the window for requests that were not sent.
//! A 401 forces one credential refresh and one replay outside the backoff
//! budget; all other retryable outcomes (429, 5xx, retry-safe transport
//! failures) share the bounded exponential backoff.

// crates.io
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	decode,
	error::{RequestError, TransientError},
	obs::{self, CallKind, CallOutcome, CallStage, RequestSpan},
	pipeline::{ApiCall, Payload, RequestPipeline},
	transport::{ApiTransport, WireRequest},
};

impl<T> RequestPipeline<T>
where
	T: ?Sized + ApiTransport,
{
	/// Executes one logical call and returns the raw payload.
	pub async fn execute(&self, call: ApiCall) -> Result<Payload> {
		const KIND: CallKind = CallKind::Execute;

		let span = RequestSpan::new(KIND, "execute");

		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		let result = span.instrument(self.run(call)).await;

		match &result {
			Ok(_) => obs::record_call_outcome(KIND, CallOutcome::Success),
			Err(_) => obs::record_call_outcome(KIND, CallOutcome::Failure),
		}

		result
	}

	/// Executes one logical call and decodes the JSON payload into `R`.
	pub async fn fetch<R>(&self, call: ApiCall) -> Result<R>
	where
		R: DeserializeOwned,
	{
		let payload = self.execute(call).await?;

		Ok(decode::decode_json(&payload)?)
	}

	/// Revokes the current token server-side and drops the stored credential.
	pub async fn revoke_token(&self) -> Result<()> {
		const KIND: CallKind = CallKind::Revoke;

		let span = RequestSpan::new(KIND, "revoke_token");

		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		let result = span.instrument(self.run(ApiCall::delete("api/v2/oauth/tokens/current"))).await;

		match result {
			Ok(_) => {
				self.session().clear();
				obs::record_call_outcome(KIND, CallOutcome::Success);

				Ok(())
			},
			Err(err) => {
				obs::record_call_outcome(KIND, CallOutcome::Failure);

				Err(err)
			},
		}
	}

	async fn run(&self, call: ApiCall) -> Result<Payload> {
		let url = call.resolve_url(self.base_url())?;
		let limiter = self.limiter_for(call.class());
		let max_attempts = self.retry_policy().max_attempts.max(1);
		let mut attempt: u32 = 0;
		let mut reauthorized = false;

		loop {
			attempt += 1;

			obs::note_stage(CallStage::RateLimitWait, attempt);
			limiter.acquire().await;
			obs::note_stage(CallStage::AuthCheck, attempt);

			let credential = self.session().authorized().await?;

			if let Some(required) = call.missing_scopes(&credential.scopes) {
				return Err(Error::MissingScopes { required });
			}

			let request = WireRequest {
				method: call.method(),
				url: url.clone(),
				bearer: Some(credential.access_token.clone()),
				body: call.wire_body(),
			};

			obs::note_stage(CallStage::InFlight, attempt);

			match self.transport.send(request).await {
				Ok(response) if response.is_success() =>
					return Ok(Payload::from_response(response)),
				Ok(response) => match response.status {
					401 => {
						if reauthorized {
							return Err(Error::AuthExpired {
								reason: "server rejected a freshly refreshed access token".into(),
							});
						}

						reauthorized = true;
						self.session().refresh().await?;
						// The forced replay sits outside the backoff budget.
						attempt = attempt.saturating_sub(1);
					},
					429 => {
						if attempt >= max_attempts {
							return Err(Error::RateLimitExceeded {
								attempts: attempt,
								retry_after: response.retry_after,
							});
						}

						self.backoff(attempt, response.retry_after).await;
					},
					status @ 500..=599 => {
						if attempt >= max_attempts {
							return Err(TransientError::Upstream {
								status,
								message: RequestError::from_body(status, &response.body).message,
								retry_after: response.retry_after,
							}
							.into());
						}

						self.backoff(attempt, response.retry_after).await;
					},
					status => return Err(RequestError::from_body(status, &response.body).into()),
				},
				Err(failure) => {
					// An ambiguous failure on a non-replayable call must not be
					// resent; the server may already have processed it.
					if (failure.is_ambiguous() && !call.replayable()) || attempt >= max_attempts {
						return Err(Error::Transient(failure.into()));
					}

					self.backoff(attempt, None).await;
				},
			}
		}
	}

	async fn backoff(&self, attempt: u32, hint: Option<Duration>) {
		obs::note_stage(CallStage::Backoff, attempt);
		tokio::time::sleep(self.retry_policy().delay_for(attempt, hint)).await;
	}
}
