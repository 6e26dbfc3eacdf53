use futures_util::StreamExt;
use rcstream_runtime::{AutoFetchConsumer, Listeners, SessionEnded, SessionStream};
use tracing::{debug, warn};

/// Treats every non-empty chunk as an update notification.
///
/// Does not parse the payload. Reports the end of the stream back to the
/// manager, which decides whether and when to reconnect.
#[derive(Debug, Default)]
pub struct ChunkForwarder;

impl AutoFetchConsumer for ChunkForwarder {
	fn attach(&self, stream: SessionStream, listeners: Listeners, ended: SessionEnded) {
		tokio::spawn(forward(stream, listeners, ended));
	}
}

async fn forward(mut stream: SessionStream, listeners: Listeners, ended: SessionEnded) {
	let session_id = stream.session_id();
	while let Some(chunk) = stream.next().await {
		match chunk {
			Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => {}
			Ok(bytes) => {
				let notified = listeners.notify_update();
				debug!(target = "rcstream.cli", %session_id, bytes = bytes.len(), notified, "update chunk");
			}
			Err(e) => {
				warn!(target = "rcstream.cli", %session_id, error = %e, "stream failed");
				ended.fail(e.to_string());
				return;
			}
		}
	}

	if stream.is_closed_by_manager() {
		debug!(target = "rcstream.cli", %session_id, "session closed by manager");
	}
	ended.complete();
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::time::Duration;

	use futures_util::stream;
	use rcstream_runtime::{
		BoxFuture, ByteStream, Collaborators, ConnectionManager, ConnectionState, ErrorKind, Listener, ManagerConfig,
		Result, StaticIdentity, StaticToken, StaticVersion, StreamRequest, StreamTransport,
	};

	use super::*;

	/// Serves a fixed list of chunks, then ends the stream.
	struct CannedTransport {
		chunks: Vec<&'static str>,
	}

	impl StreamTransport for CannedTransport {
		fn open<'a>(&'a self, _request: &'a StreamRequest) -> BoxFuture<'a, Result<ByteStream>> {
			let chunks: Vec<Result<Vec<u8>>> = self.chunks.iter().map(|c| Ok(c.as_bytes().to_vec())).collect();
			Box::pin(async move { Ok(Box::pin(stream::iter(chunks)) as ByteStream) })
		}
	}

	#[derive(Default)]
	struct Counter {
		updates: AtomicUsize,
	}

	impl Listener for Counter {
		fn on_update(&self) {
			self.updates.fetch_add(1, Ordering::SeqCst);
		}

		fn on_error(&self, _kind: ErrorKind, _message: &str) {}
	}

	#[tokio::test(start_paused = true)]
	async fn forwards_non_empty_chunks_then_reports_end() {
		let manager = ConnectionManager::start(
			ManagerConfig::new("1:123456789:android:abcdef", "key"),
			Collaborators {
				versions: Arc::new(StaticVersion::new(1)),
				auth: Arc::new(StaticToken::none()),
				identity: Arc::new(StaticIdentity::default()),
				transport: Arc::new(CannedTransport {
					chunks: vec!["", "{\"latestTemplateVersionNumber\": 2}", "\r\n"],
				}),
				consumer: Arc::new(ChunkForwarder),
			},
		);
		let counter = Arc::new(Counter::default());
		let _registration = manager.add_listener(counter.clone());

		let mut state = manager.watch_state();
		tokio::time::timeout(
			Duration::from_secs(60),
			state.wait_for(|s| *s == ConnectionState::RetryScheduled),
		)
		.await
		.unwrap()
		.unwrap();

		assert_eq!(counter.updates.load(Ordering::SeqCst), 1);
		assert_eq!(manager.stats().sessions_closed, 1);
		manager.shutdown().await;
	}
}
