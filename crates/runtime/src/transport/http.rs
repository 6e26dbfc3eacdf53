use std::time::Duration;

use futures_util::StreamExt;
use tracing::debug;

use super::{ByteStream, StreamTransport};
use crate::error::{Error, Result};
use crate::provider::BoxFuture;
use crate::request::StreamRequest;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Streaming HTTP transport over `reqwest` with rustls.
#[derive(Debug, Clone)]
pub struct HttpTransport {
	client: reqwest::Client,
}

impl HttpTransport {
	/// Creates a transport with its own connection pool.
	///
	/// # Errors
	///
	/// Returns [`Error::TransportOpen`] if the TLS backend fails to initialise.
	pub fn new() -> Result<Self> {
		let client = reqwest::Client::builder()
			.connect_timeout(CONNECT_TIMEOUT)
			.build()
			.map_err(|e| Error::TransportOpen(format!("failed to build HTTP client: {e}")))?;
		Ok(Self { client })
	}
}

impl StreamTransport for HttpTransport {
	fn open<'a>(&'a self, request: &'a StreamRequest) -> BoxFuture<'a, Result<ByteStream>> {
		Box::pin(async move {
			let body = request.body_bytes()?;
			let mut builder = self.client.post(request.url.clone());
			for (name, value) in &request.headers {
				builder = builder.header(*name, value.as_str());
			}

			let response = builder
				.body(body)
				.send()
				.await
				.map_err(|e| Error::TransportOpen(e.to_string()))?;

			let status = response.status();
			if !status.is_success() {
				return Err(Error::TransportOpen(format!(
					"server responded with HTTP {status}"
				)));
			}
			debug!(target = "rcstream.transport", url = %request.url, %status, "stream opened");

			let chunks = response.bytes_stream().map(|chunk| {
				chunk
					.map(|bytes| bytes.to_vec())
					.map_err(|e| Error::StreamTerminated(e.to_string()))
			});
			Ok(Box::pin(chunks) as ByteStream)
		})
	}
}
