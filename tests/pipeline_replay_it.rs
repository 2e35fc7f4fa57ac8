//! Replay-policy coverage driven through a scripted transport, including the
//! ambiguous-failure dispositions that a mock HTTP server cannot simulate.

// std
use std::{
	collections::VecDeque,
	io,
	sync::{Arc, Mutex},
};
// crates.io
use time::Duration;
// self
use rosu_pipeline::{
	auth::Credential,
	error::{Error, TransientError},
	pipeline::{ApiCall, Replay, RequestPipeline, RetryPolicy},
	session::CredentialSession,
	transport::{ApiTransport, Method, RawResponse, TransportFailure, TransportFuture, WireRequest},
	url::Url,
};

#[derive(Clone, Copy, Debug)]
enum Step {
	Respond(u16, &'static str),
	FailNotSent,
	FailAmbiguous,
}

#[derive(Debug, Default)]
struct ScriptedTransport {
	script: Mutex<VecDeque<Step>>,
	log: Mutex<Vec<(Method, String)>>,
}
impl ScriptedTransport {
	fn scripted(steps: impl IntoIterator<Item = Step>) -> Self {
		Self { script: Mutex::new(steps.into_iter().collect()), log: Mutex::new(Vec::new()) }
	}

	fn sent(&self) -> Vec<(Method, String)> {
		self.log.lock().unwrap().clone()
	}
}
impl ApiTransport for ScriptedTransport {
	fn send(&self, request: WireRequest) -> TransportFuture<'_> {
		let step = self.script.lock().unwrap().pop_front();

		self.log.lock().unwrap().push((request.method, request.url.path().to_owned()));

		Box::pin(async move {
			match step.expect("Scripted transport ran out of steps.") {
				Step::Respond(status, body) => Ok(RawResponse {
					status,
					content_type: Some("application/json".into()),
					retry_after: None,
					body: body.as_bytes().to_vec(),
				}),
				Step::FailNotSent =>
					Err(TransportFailure::not_sent(io::Error::other("connection refused"))),
				Step::FailAmbiguous =>
					Err(TransportFailure::ambiguous(io::Error::other("connection reset mid-flight"))),
			}
		})
	}
}

fn fresh_credential() -> Credential {
	Credential::builder()
		.access_token("scripted-access")
		.refresh_token("scripted-refresh")
		.expires_in(Duration::hours(1))
		.build()
		.expect("Credential fixture should build.")
}

fn build_pipeline(
	steps: impl IntoIterator<Item = Step>,
) -> (RequestPipeline<ScriptedTransport>, Arc<ScriptedTransport>) {
	let transport = Arc::new(ScriptedTransport::scripted(steps));
	let base_url = Url::parse("https://osu.ppy.sh").expect("Base URL fixture should parse.");
	let session = CredentialSession::new(transport.clone(), &base_url, "9001", "secret-replay")
		.expect("Session fixture should build.")
		.with_credential(fresh_credential());
	let pipeline = RequestPipeline::new(session, base_url).with_retry_policy(RetryPolicy {
		max_attempts: 3,
		backoff_base: Duration::milliseconds(1),
		backoff_cap: Duration::milliseconds(2),
		jitter: 0.0,
	});

	(pipeline, transport)
}

#[tokio::test]
async fn read_calls_replay_after_ambiguous_failures() {
	let (pipeline, transport) =
		build_pipeline([Step::FailAmbiguous, Step::Respond(200, "{\"ok\":true}")]);
	let payload = pipeline
		.execute(ApiCall::get("api/v2/me"))
		.await
		.expect("Read calls should retry through ambiguous failures.");

	assert_eq!(payload.status, 200);
	assert_eq!(transport.sent().len(), 2);
}

#[tokio::test]
async fn mutating_calls_stop_at_ambiguous_failures() {
	let (pipeline, transport) = build_pipeline([Step::FailAmbiguous]);
	let err = pipeline
		.execute(ApiCall::post("api/v2/chat/new"))
		.await
		.expect_err("Mutating calls must not replay after ambiguous failures.");

	assert_eq!(transport.sent().len(), 1);
	assert!(matches!(
		err,
		Error::Transient(TransientError::Network { ambiguous: true, .. }),
	));
}

#[tokio::test]
async fn mutating_calls_replay_when_never_dispatched() {
	let (pipeline, transport) =
		build_pipeline([Step::FailNotSent, Step::Respond(200, "{\"ok\":true}")]);

	pipeline
		.execute(ApiCall::post("api/v2/chat/new"))
		.await
		.expect("A request that never left the process is safe to resend.");

	assert_eq!(transport.sent().len(), 2);
}

#[tokio::test]
async fn replay_always_overrides_the_mutating_default() {
	let (pipeline, transport) =
		build_pipeline([Step::FailAmbiguous, Step::Respond(200, "{\"ok\":true}")]);

	pipeline
		.execute(ApiCall::post("api/v2/chat/new").with_replay(Replay::Always))
		.await
		.expect("Replay::Always should opt a mutating call into retries.");

	assert_eq!(transport.sent().len(), 2);
}

#[tokio::test]
async fn replay_never_pins_read_calls_to_one_attempt() {
	let (pipeline, transport) = build_pipeline([Step::FailAmbiguous]);
	let err = pipeline
		.execute(ApiCall::get("api/v2/me").with_replay(Replay::Never))
		.await
		.expect_err("Replay::Never should surface the first ambiguous failure.");

	assert_eq!(transport.sent().len(), 1);
	assert!(matches!(err, Error::Transient(_)));
}

#[tokio::test]
async fn transient_failures_exhaust_after_exactly_max_attempts() {
	let (pipeline, transport) =
		build_pipeline([Step::FailNotSent, Step::FailNotSent, Step::FailNotSent]);
	let err = pipeline
		.execute(ApiCall::get("api/v2/me"))
		.await
		.expect_err("Three connect failures should exhaust a three-attempt budget.");

	assert_eq!(transport.sent().len(), 3);
	assert!(matches!(
		err,
		Error::Transient(TransientError::Network { ambiguous: false, .. }),
	));
}

#[tokio::test]
async fn refresh_never_rolls_the_expiry_backward() {
	let (pipeline, transport) = build_pipeline([
		Step::Respond(
			200,
			"{\"access_token\":\"long-access\",\"token_type\":\"Bearer\",\"expires_in\":7200}",
		),
		Step::Respond(
			200,
			"{\"access_token\":\"short-access\",\"token_type\":\"Bearer\",\"expires_in\":1}",
		),
	]);
	let session = pipeline.session();
	let long_lived = session.refresh().await.expect("First forced refresh should succeed.");
	let clamped = session.refresh().await.expect("Second forced refresh should succeed.");

	assert_eq!(clamped.access_token.expose(), "short-access");
	assert!(clamped.expires_at >= long_lived.expires_at);
	assert!(transport.sent().iter().all(|(method, path)| {
		*method == Method::Post && path == "/oauth/token"
	}));
}
