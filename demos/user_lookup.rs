//! Fetches a user profile from the production osu! API using client
//! credentials from the environment: `OSU_CLIENT_ID` and `OSU_CLIENT_SECRET`.

// crates.io
use color_eyre::Result;
use serde::Deserialize;
// self
use rosu_pipeline::pipeline::{ApiCall, RequestPipeline};

#[derive(Debug, Deserialize)]
struct User {
	id: u64,
	username: String,
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let client_id = std::env::var("OSU_CLIENT_ID")?;
	let client_secret = std::env::var("OSU_CLIENT_SECRET")?;
	let pipeline = RequestPipeline::osu(client_id, client_secret)?;
	let user: User = pipeline.fetch(ApiCall::get("api/v2/users/2").query("key", "id")).await?;

	println!("{} (#{})", user.username, user.id);

	Ok(())
}
