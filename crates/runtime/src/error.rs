//! Error types for the realtime stream runtime.

use thiserror::Error;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while opening or maintaining the realtime stream.
#[derive(Debug, Error)]
pub enum Error {
	/// Namespace, project or endpoint could not be composed into a valid URL.
	#[error("Malformed realtime endpoint: {0}")]
	MalformedEndpoint(String),

	/// Application id could not be parsed.
	#[error("Invalid application id: {0}")]
	InvalidAppId(String),

	/// I/O fault while opening the connection or writing the request.
	#[error("Failed to open realtime stream: {0}")]
	TransportOpen(String),

	/// Server closed or errored the stream after it was open.
	#[error("Realtime stream terminated: {0}")]
	StreamTerminated(String),

	/// All retries in the current cycle failed.
	#[error("Unable to establish realtime http stream.")]
	RetriesExhausted,

	/// The manager has been shut down.
	#[error("Connection manager is shut down")]
	ManagerClosed,

	/// The installation service could not supply an auth token.
	#[error("Installation token unavailable: {0}")]
	TokenUnavailable(String),

	/// JSON serialization error.
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

/// Classification of an [`Error`] as delivered to listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
	MalformedEndpoint,
	TransportOpen,
	StreamTerminated,
	/// The stream could not be (re)established. The only kind listeners see today.
	StreamUnavailable,
	Internal,
}

impl Error {
	/// Maps this error onto the kind reported to listeners.
	pub fn kind(&self) -> ErrorKind {
		match self {
			Error::MalformedEndpoint(_) | Error::InvalidAppId(_) => ErrorKind::MalformedEndpoint,
			Error::TransportOpen(_) => ErrorKind::TransportOpen,
			Error::StreamTerminated(_) => ErrorKind::StreamTerminated,
			Error::RetriesExhausted => ErrorKind::StreamUnavailable,
			Error::TokenUnavailable(_) | Error::ManagerClosed | Error::Json(_) => ErrorKind::Internal,
		}
	}

	/// Returns true if the manager keeps retrying after this error.
	pub fn is_retryable(&self) -> bool {
		!self.is_terminal()
	}

	/// Returns true if no further automatic attempts follow this error.
	pub fn is_terminal(&self) -> bool {
		matches!(self, Error::RetriesExhausted | Error::ManagerClosed)
	}
}

impl From<rcstream_protocol::ProtocolError> for Error {
	fn from(err: rcstream_protocol::ProtocolError) -> Self {
		match err {
			rcstream_protocol::ProtocolError::InvalidAppId(raw) => Error::InvalidAppId(raw),
		}
	}
}
