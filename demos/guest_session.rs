//! Walks the full pipeline against a mock osu! API: guest token bootstrap,
//! bearer injection, and a rate-limited fetch.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use rosu_pipeline::{
	limit::{LimiterConfig, SlidingWindowLimiter},
	pipeline::{ApiCall, RequestPipeline},
	session::CredentialSession,
	transport::ReqwestTransport,
	url::Url,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"demo-access\",\"token_type\":\"Bearer\",\"expires_in\":86400}",
			);
		})
		.await;
	let api_mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/api/v2/seasonal-backgrounds")
				.header("authorization", "Bearer demo-access");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"ends_at\":null,\"backgrounds\":[]}");
		})
		.await;
	let base_url = Url::parse(&server.base_url())?;
	let session =
		CredentialSession::new(ReqwestTransport::default(), &base_url, "9001", "demo-secret")?;

	session.on_update(|credential| {
		println!("credential refreshed; expires at {}", credential.expires_at);
	});

	let pipeline = RequestPipeline::new(session, base_url).with_limiter(Arc::new(
		SlidingWindowLimiter::new(LimiterConfig::per_minute(600)?),
	));
	let payload = pipeline.execute(ApiCall::get("api/v2/seasonal-backgrounds")).await?;

	println!("fetched {} bytes (json: {})", payload.bytes().len(), payload.is_json());

	token_mock.assert_async().await;
	api_mock.assert_async().await;

	Ok(())
}
