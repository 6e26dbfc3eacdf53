//! Connection manager configuration.

use std::time::Duration;

use rcstream_protocol::DEFAULT_REALTIME_ENDPOINT;

use crate::retry::RetryConfig;

/// Namespace used when none is configured.
pub const DEFAULT_NAMESPACE: &str = "firebase";

/// How long a request waits for the installation token by default.
pub const DEFAULT_TOKEN_TIMEOUT: Duration = Duration::from_secs(2);

/// How long an open attempt may wait for response headers by default.
pub const DEFAULT_OPEN_TIMEOUT: Duration = Duration::from_secs(60);

/// Settings for one [`ConnectionManager`](crate::ConnectionManager).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerConfig {
	/// Application id, `<prefix>:<project-number>:<platform>:<hex>`.
	pub app_id: String,
	pub api_key: String,
	pub namespace: String,
	/// Base URL; the request goes to `<endpoint>/<project>/namespaces/<namespace>`.
	pub endpoint: String,
	/// Upper bound on waiting for the installation token per attempt.
	///
	/// The token is fetched as part of each open attempt, so a slow auth
	/// provider delays the open by at most this long; after that the request
	/// goes out without the auth header. The wait is cancelled together with
	/// the attempt when the stream is closed or the manager shuts down.
	pub token_timeout: Duration,
	/// Upper bound on an open attempt once the request is built. A server that
	/// accepts the connection but never answers counts as a failed open and
	/// is retried.
	pub open_timeout: Duration,
	pub retry: RetryConfig,
}

impl ManagerConfig {
	#[must_use]
	pub fn new(app_id: impl Into<String>, api_key: impl Into<String>) -> Self {
		Self {
			app_id: app_id.into(),
			api_key: api_key.into(),
			namespace: DEFAULT_NAMESPACE.to_string(),
			endpoint: DEFAULT_REALTIME_ENDPOINT.to_string(),
			token_timeout: DEFAULT_TOKEN_TIMEOUT,
			open_timeout: DEFAULT_OPEN_TIMEOUT,
			retry: RetryConfig::default(),
		}
	}

	#[must_use]
	pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
		self.namespace = namespace.into();
		self
	}

	#[must_use]
	pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
		self.endpoint = endpoint.into();
		self
	}

	#[must_use]
	pub fn with_token_timeout(mut self, timeout: Duration) -> Self {
		self.token_timeout = timeout;
		self
	}

	#[must_use]
	pub fn with_open_timeout(mut self, timeout: Duration) -> Self {
		self.open_timeout = timeout;
		self
	}

	#[must_use]
	pub fn with_retry(mut self, retry: RetryConfig) -> Self {
		self.retry = retry;
		self
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults() {
		let config = ManagerConfig::new("1:1:web:ab", "key");
		assert_eq!(config.namespace, "firebase");
		assert_eq!(config.endpoint, DEFAULT_REALTIME_ENDPOINT);
		assert_eq!(config.token_timeout, Duration::from_secs(2));
		assert_eq!(config.open_timeout, Duration::from_secs(60));
		assert_eq!(config.retry.max_retries, 7);
	}
}
