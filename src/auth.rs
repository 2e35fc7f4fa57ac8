//! Credential records, scope sets, and secret wrappers.

pub mod credential;
pub mod scope;
pub mod secret;

pub use credential::*;
pub use scope::*;
pub use secret::*;
