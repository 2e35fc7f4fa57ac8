//! Credential records, lifecycle helpers, and the builder used by the session.

// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, secret::TokenSecret},
};

/// Current lifecycle status for a credential.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CredentialStatus {
	/// Credential is currently valid.
	Active,
	/// Credential exceeded its expiry instant.
	Expired,
	/// Credential has been revoked locally or by the server.
	Revoked,
}

/// Errors produced by [`CredentialBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum CredentialBuilderError {
	/// Issued when no access token value was provided.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// Issued when no expiry (absolute or relative) was configured.
	#[error("Expiry must be supplied via expires_at or expires_in.")]
	MissingExpiry,
}

/// Access/refresh token pair authorizing outbound calls.
///
/// Owned by one [`CredentialSession`](crate::session::CredentialSession); the session
/// replaces the whole record on refresh and never rolls `expires_at` backward.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credential {
	/// Token type reported by the token endpoint, normally `Bearer`.
	pub token_type: String,
	/// Access token secret; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// Refresh token secret, if the grant issued one. Guest grants do not.
	pub refresh_token: Option<TokenSecret>,
	/// Scopes granted to this credential.
	pub scopes: ScopeSet,
	/// Instant the credential was issued.
	pub issued_at: OffsetDateTime,
	/// Instant the access token stops being accepted.
	pub expires_at: OffsetDateTime,
	/// Revocation instant if the credential has been revoked.
	pub revoked_at: Option<OffsetDateTime>,
}
impl Credential {
	/// Returns a builder for constructing credential records.
	pub fn builder() -> CredentialBuilder {
		CredentialBuilder::default()
	}

	/// Computes the lifecycle status at a given instant.
	pub fn status_at(&self, instant: OffsetDateTime) -> CredentialStatus {
		if self.revoked_at.is_some() {
			return CredentialStatus::Revoked;
		}
		if instant >= self.expires_at {
			return CredentialStatus::Expired;
		}

		CredentialStatus::Active
	}

	/// Convenience helper that checks the status using the current UTC instant.
	pub fn status(&self) -> CredentialStatus {
		self.status_at(OffsetDateTime::now_utc())
	}

	/// Returns `true` if the credential is active and remains so for at least `margin`.
	pub fn is_fresh_at(&self, instant: OffsetDateTime, margin: Duration) -> bool {
		matches!(self.status_at(instant), CredentialStatus::Active)
			&& self.expires_at - instant > margin
	}

	/// Returns `true` if the credential has expired at the provided instant.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		matches!(self.status_at(instant), CredentialStatus::Expired)
	}

	/// Returns `true` if the credential has been revoked.
	pub fn is_revoked(&self) -> bool {
		self.revoked_at.is_some()
	}

	/// Returns `true` if a refresh-token grant can renew this credential.
	pub fn can_refresh(&self) -> bool {
		self.refresh_token.is_some()
	}

	/// Marks the credential as revoked.
	pub fn revoke(&mut self, instant: OffsetDateTime) {
		self.revoked_at = Some(instant);
	}
}
impl Debug for Credential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credential")
			.field("token_type", &self.token_type)
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("scopes", &self.scopes)
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.field("revoked_at", &self.revoked_at)
			.finish()
	}
}

/// Builder for [`Credential`].
#[derive(Clone, Debug, Default)]
pub struct CredentialBuilder {
	token_type: Option<String>,
	access_token: Option<TokenSecret>,
	refresh_token: Option<TokenSecret>,
	scopes: ScopeSet,
	issued_at: Option<OffsetDateTime>,
	expires_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
}
impl CredentialBuilder {
	/// Overrides the token type (defaults to `Bearer`).
	pub fn token_type(mut self, value: impl Into<String>) -> Self {
		self.token_type = Some(value.into());

		self
	}

	/// Provides the access token value.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Provides the refresh token value.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(token));

		self
	}

	/// Sets the scopes granted to the credential.
	pub fn scopes(mut self, scopes: ScopeSet) -> Self {
		self.scopes = scopes;

		self
	}

	/// Sets the issued-at instant.
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Sets an absolute expiry instant.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets a relative expiry duration from the issued instant.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Consumes the builder and produces a [`Credential`].
	pub fn build(self) -> Result<Credential, CredentialBuilderError> {
		let access_token = self.access_token.ok_or(CredentialBuilderError::MissingAccessToken)?;
		let issued_at = self.issued_at.unwrap_or_else(OffsetDateTime::now_utc);
		let expires_at = match (self.expires_at, self.expires_in) {
			(Some(instant), _) => instant,
			(None, Some(delta)) => issued_at + delta,
			(None, None) => return Err(CredentialBuilderError::MissingExpiry),
		};

		Ok(Credential {
			token_type: self.token_type.unwrap_or_else(|| "Bearer".into()),
			access_token,
			refresh_token: self.refresh_token,
			scopes: self.scopes,
			issued_at,
			expires_at,
			revoked_at: None,
		})
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::auth::Scope;

	#[test]
	fn status_transitions_cover_all_states() {
		let issued = macros::datetime!(2025-01-01 00:00 UTC);
		let expires = macros::datetime!(2025-01-01 01:00 UTC);
		let mut credential = Credential::builder()
			.access_token("access")
			.refresh_token("refresh")
			.scopes(ScopeSet::public())
			.issued_at(issued)
			.expires_at(expires)
			.build()
			.expect("Credential builder should succeed for status transitions.");

		assert_eq!(
			credential.status_at(macros::datetime!(2025-01-01 00:30 UTC)),
			CredentialStatus::Active,
		);
		assert_eq!(
			credential.status_at(macros::datetime!(2025-01-01 01:00 UTC)),
			CredentialStatus::Expired,
		);

		credential.revoke(macros::datetime!(2025-01-01 00:10 UTC));

		assert_eq!(
			credential.status_at(macros::datetime!(2025-01-01 00:30 UTC)),
			CredentialStatus::Revoked,
		);
	}

	#[test]
	fn freshness_respects_margin() {
		let issued = macros::datetime!(2025-01-01 00:00 UTC);
		let credential = Credential::builder()
			.access_token("access")
			.issued_at(issued)
			.expires_in(Duration::minutes(10))
			.build()
			.expect("Credential builder should support relative expiry.");

		assert_eq!(credential.expires_at, macros::datetime!(2025-01-01 00:10 UTC));
		assert!(credential.is_fresh_at(issued, Duration::seconds(30)));
		assert!(!credential.is_fresh_at(issued + Duration::minutes(9), Duration::seconds(90)));
		assert!(!credential.is_fresh_at(issued + Duration::minutes(11), Duration::ZERO));
	}

	#[test]
	fn guest_credential_cannot_refresh() {
		let credential = Credential::builder()
			.access_token("guest")
			.scopes(ScopeSet::new([Scope::Public]))
			.expires_in(Duration::hours(1))
			.build()
			.expect("Guest credential builder should succeed.");

		assert!(!credential.can_refresh());
	}

	#[test]
	fn debug_redacts_secrets() {
		let credential = Credential::builder()
			.access_token("very-secret-access")
			.refresh_token("very-secret-refresh")
			.expires_in(Duration::hours(1))
			.build()
			.expect("Credential builder should succeed for redaction test.");
		let rendered = format!("{credential:?}");

		assert!(!rendered.contains("very-secret"));
		assert!(rendered.contains("<redacted>"));
	}
}
