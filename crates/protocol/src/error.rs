//! Parse errors for protocol values.

use thiserror::Error;

/// Result type alias for protocol parsing.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while interpreting protocol values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
	/// Application identifier does not match `X:<project-number>:<platform>:<hex>`.
	#[error("Invalid application id '{0}': expected <prefix>:<project-number>:<android|ios|web>:<hex>")]
	InvalidAppId(String),
}
