//! Rate-limited, token-refreshing request pipeline for the osu! API, with
//! sliding-window throttling, single-flight credential refresh, and bounded
//! retry orchestration in one async core.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod decode;
pub mod error;
pub mod limit;
pub mod obs;
pub mod pipeline;
pub mod session;
pub mod transport;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::{Credential, ScopeSet},
		pipeline::RequestPipeline,
		session::CredentialSession,
		transport::ReqwestTransport,
	};

	/// Pipeline type alias used by reqwest-backed integration tests.
	pub type ReqwestTestPipeline = RequestPipeline<ReqwestTransport>;

	/// Builds a reqwest transport that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_transport() -> ReqwestTransport {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestTransport::with_client(client)
	}

	/// Constructs a [`RequestPipeline`] plus its session against a mock server base URL.
	pub fn build_reqwest_test_pipeline(
		base_url: Url,
		client_id: &str,
		client_secret: &str,
	) -> (ReqwestTestPipeline, Arc<CredentialSession<ReqwestTransport>>) {
		let session = Arc::new(
			CredentialSession::new(test_reqwest_transport(), &base_url, client_id, client_secret)
				.expect("Failed to build test credential session."),
		);
		let pipeline = RequestPipeline::new(session.clone(), base_url);

		(pipeline, session)
	}

	/// Builds a public-scope credential fixture with the provided lifetime.
	pub fn fixture_credential(access: &str, refresh: Option<&str>, ttl: Duration) -> Credential {
		let mut builder =
			Credential::builder().access_token(access).scopes(ScopeSet::public()).expires_in(ttl);

		if let Some(refresh) = refresh {
			builder = builder.refresh_token(refresh);
		}

		builder.build().expect("Failed to build test credential.")
	}
}

mod _prelude {
	pub use std::{
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
