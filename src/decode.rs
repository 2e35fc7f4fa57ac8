//! Decoder seam between raw payloads and typed records.
//!
//! Kept deliberately thin: the pipeline's job ends at handing bytes over, and
//! model crates own the shapes. `serde_path_to_error` names the mismatched
//! field when a payload does not fit, and the raw preview travels with the
//! error for diagnostics.

// crates.io
use serde::de::DeserializeOwned;
// self
use crate::{_prelude::*, error::DecodeError, pipeline::Payload};

/// Decodes a JSON body slice into a typed record.
pub fn from_slice<T>(body: &[u8]) -> Result<T, DecodeError>
where
	T: DeserializeOwned,
{
	let mut deserializer = serde_json::Deserializer::from_slice(body);

	serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|source| DecodeError { source, body_preview: crate::error::preview(body) })
}

/// Decodes a successful payload's JSON body into a typed record.
pub fn decode_json<T>(payload: &Payload) -> Result<T, DecodeError>
where
	T: DeserializeOwned,
{
	from_slice(payload.bytes())
}
