#![cfg(all(feature = "reqwest", feature = "test"))]

// crates.io
use httpmock::prelude::*;
// self
use rosu_pipeline::{
	_preludet::*,
	auth::{Credential, Scope},
	session::CredentialSession,
	transport::ReqwestTransport,
};

const CLIENT_ID: &str = "9001";
const CLIENT_SECRET: &str = "secret-refresh";

fn build_session(server: &MockServer) -> CredentialSession<ReqwestTransport> {
	let base_url =
		Url::parse(&server.base_url()).expect("Mock server base URL should parse successfully.");

	CredentialSession::new(test_reqwest_transport(), &base_url, CLIENT_ID, CLIENT_SECRET)
		.expect("Credential session should build against the mock server.")
}

#[tokio::test]
async fn refresh_rotates_credential_and_updates_session() {
	let server = MockServer::start_async().await;
	let session = build_session(&server)
		.with_credential(fixture_credential("stale-access", Some("stale-refresh"), Duration::seconds(5)));
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/oauth/token")
				.body_includes("grant_type=refresh_token")
				.body_includes("refresh_token=stale-refresh");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"fresh-access\",\"refresh_token\":\"fresh-refresh\",\"token_type\":\"Bearer\",\"expires_in\":3600}",
			);
		})
		.await;
	let credential =
		session.authorized().await.expect("Stale credential should refresh successfully.");

	mock.assert_async().await;

	assert_eq!(credential.access_token.expose(), "fresh-access");
	assert_eq!(
		credential.refresh_token.as_ref().map(|secret| secret.expose()),
		Some("fresh-refresh"),
	);
	assert_eq!(session.metrics().exchanges(), 1);

	let stored = session.credential().expect("Refreshed credential should be stored.");

	assert_eq!(stored.access_token.expose(), "fresh-access");
}

#[tokio::test]
async fn concurrent_stale_discoveries_share_one_exchange() {
	let server = MockServer::start_async().await;
	let session = Arc::new(build_session(&server).with_credential(fixture_credential(
		"expiring-access",
		Some("expiring-refresh"),
		Duration::seconds(5),
	)));
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"shared-access\",\"refresh_token\":\"shared-refresh\",\"token_type\":\"Bearer\",\"expires_in\":3600}",
			);
		})
		.await;
	let (a, b, c, d) = tokio::join!(
		session.authorized(),
		session.authorized(),
		session.authorized(),
		session.authorized(),
	);

	for result in [a, b, c, d] {
		let credential = result.expect("Every concurrent caller should receive a credential.");

		assert_eq!(credential.access_token.expose(), "shared-access");
	}

	mock.assert_calls_async(1).await;

	assert_eq!(session.metrics().exchanges(), 1);
	assert_eq!(session.metrics().reuses(), 3);
}

#[tokio::test]
async fn missing_refresh_token_falls_back_to_guest_grant() {
	let server = MockServer::start_async().await;
	let session = build_session(&server);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/oauth/token")
				.body_includes("grant_type=client_credentials")
				.body_includes("scope=public");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"guest-access\",\"token_type\":\"Bearer\",\"expires_in\":86400}",
			);
		})
		.await;
	let credential =
		session.authorized().await.expect("Guest exchange should mint a credential.");

	mock.assert_async().await;

	assert_eq!(credential.access_token.expose(), "guest-access");
	assert!(!credential.can_refresh());
	assert!(credential.scopes.contains(Scope::Public));
}

#[tokio::test]
async fn rejected_refresh_token_surfaces_auth_expired() {
	let server = MockServer::start_async().await;
	let session = build_session(&server).with_credential(fixture_credential(
		"revoked-access",
		Some("revoked-refresh"),
		Duration::seconds(5),
	));
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(401)
				.header("content-type", "application/json")
				.body("{\"error\":\"invalid refresh token\"}");
		})
		.await;
	let err = session
		.authorized()
		.await
		.expect_err("A rejected refresh token should surface to the caller.");

	mock.assert_async().await;

	assert!(matches!(err, Error::AuthExpired { .. }));
	assert!(err.to_string().contains("invalid refresh token"));
	assert_eq!(session.metrics().failures(), 1);
}

#[tokio::test]
async fn token_endpoint_outage_is_transient() {
	let server = MockServer::start_async().await;
	let session = build_session(&server).with_credential(fixture_credential(
		"old-access",
		Some("old-refresh"),
		Duration::seconds(5),
	));
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(503).body("upstream maintenance");
		})
		.await;
	let err = session
		.authorized()
		.await
		.expect_err("A token endpoint outage should surface as transient.");

	mock.assert_async().await;

	assert!(matches!(err, Error::Transient(_)));
}

#[tokio::test]
async fn update_hook_observes_rotated_credentials() {
	let server = MockServer::start_async().await;
	let session = build_session(&server).with_credential(fixture_credential(
		"hook-access",
		Some("hook-refresh"),
		Duration::seconds(5),
	));
	let observed: Arc<Mutex<Option<Credential>>> = Arc::new(Mutex::new(None));
	let sink = observed.clone();

	session.on_update(move |credential| {
		*sink.lock() = Some(credential.clone());
	});

	let _mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"rotated-access\",\"refresh_token\":\"rotated-refresh\",\"token_type\":\"Bearer\",\"expires_in\":3600}",
			);
		})
		.await;

	session.authorized().await.expect("Refresh should succeed for the hook test.");

	let seen = observed.lock().clone().expect("Update hook should observe the new credential.");

	assert_eq!(seen.access_token.expose(), "rotated-access");
	assert_eq!(seen.refresh_token.as_ref().map(|secret| secret.expose()), Some("rotated-refresh"));
}

#[tokio::test]
async fn forced_refresh_reuses_unrotated_refresh_token() {
	let server = MockServer::start_async().await;
	let session = build_session(&server).with_credential(fixture_credential(
		"keep-access",
		Some("keep-refresh"),
		Duration::hours(1),
	));
	let _mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"next-access\",\"token_type\":\"Bearer\",\"expires_in\":3600}",
			);
		})
		.await;
	let credential = session.refresh().await.expect("Forced refresh should succeed.");

	assert_eq!(credential.access_token.expose(), "next-access");
	// The server omitted a rotation, so the previous refresh token carries over.
	assert_eq!(credential.refresh_token.as_ref().map(|secret| secret.expose()), Some("keep-refresh"));

	// A fresh snapshot means authorized() must not spend another exchange.
	session.authorized().await.expect("Snapshot should satisfy the freshness margin.");

	assert_eq!(session.metrics().exchanges(), 1);
}
