//! One open realtime stream.
//!
//! A [`Session`] is the manager's exclusive handle on an open connection. The
//! byte stream itself is handed to the auto-fetch consumer as a read-only
//! [`SessionStream`] that ends as soon as the manager closes the session.
//! The consumer reports the end of the stream through [`SessionEnded`], which
//! the manager receives as a command on its worker queue.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};
use std::time::Instant;

use futures_util::Stream;
use futures_util::task::AtomicWaker;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::connection::Command;
use crate::error::Result;
use crate::listener::Listeners;
use crate::request::StreamRequest;
use crate::transport::{ByteStream, StreamTransport};

/// Identifier of a session, increasing per manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(pub(crate) u64);

impl SessionId {
	pub fn as_u64(self) -> u64 {
		self.0
	}
}

impl fmt::Display for SessionId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "session-{}", self.0)
	}
}

/// Response body shared by a [`Session`] and its [`SessionStream`].
///
/// Closing takes the body out of the slot, which releases the transport even
/// while the consumer is not polling.
struct Body {
	stream: Mutex<Option<ByteStream>>,
	closed: AtomicBool,
	waker: AtomicWaker,
}

/// Exclusively owned handle on an open stream.
pub(crate) struct Session {
	id: SessionId,
	body: Arc<Body>,
	opened_at: Instant,
}

impl Session {
	/// Opens the connection and writes the request through `transport`.
	pub(crate) async fn open(
		id: SessionId,
		transport: &dyn StreamTransport,
		request: &StreamRequest,
	) -> Result<(Session, SessionStream)> {
		let body = transport.open(request).await?;
		Ok(Self::attach(id, body))
	}

	/// Wraps an already-open body stream.
	pub(crate) fn attach(id: SessionId, stream: ByteStream) -> (Session, SessionStream) {
		let body = Arc::new(Body {
			stream: Mutex::new(Some(stream)),
			closed: AtomicBool::new(false),
			waker: AtomicWaker::new(),
		});
		let session = Session {
			id,
			body: Arc::clone(&body),
			opened_at: Instant::now(),
		};
		let stream = SessionStream {
			id,
			body,
			finished: false,
			closed_by_manager: false,
		};
		(session, stream)
	}

	pub(crate) fn id(&self) -> SessionId {
		self.id
	}

	pub(crate) fn is_open(&self) -> bool {
		!self.body.closed.load(Ordering::SeqCst)
	}

	/// Releases the transport. Idempotent; returns whether this call closed it.
	pub(crate) fn close(&mut self) -> bool {
		if self.body.closed.swap(true, Ordering::SeqCst) {
			return false;
		}
		let released = self.body.stream.lock().take();
		drop(released);
		self.body.waker.wake();
		tracing::debug!(
			target = "rcstream.session",
			session_id = self.id.0,
			open_for_ms = self.opened_at.elapsed().as_millis() as u64,
			"session closed"
		);
		true
	}
}

impl Drop for Session {
	fn drop(&mut self) {
		self.close();
	}
}

/// Closes the session held in `slot`, if any, and clears the slot.
///
/// Safe on an empty slot or an already-closed session.
pub(crate) fn close_session(slot: &mut Option<Session>) -> bool {
	slot.take().is_some_and(|mut session| session.close())
}

/// Read-only view of an open stream's body.
///
/// Yields raw chunks until the server ends the stream, a transport error
/// occurs, or the manager closes the session.
pub struct SessionStream {
	id: SessionId,
	body: Arc<Body>,
	finished: bool,
	closed_by_manager: bool,
}

impl SessionStream {
	pub fn session_id(&self) -> SessionId {
		self.id
	}

	/// True if the stream ended because the manager closed the session,
	/// false while it is running or after the server ended it.
	pub fn is_closed_by_manager(&self) -> bool {
		self.closed_by_manager
	}
}

impl Stream for SessionStream {
	type Item = Result<Vec<u8>>;

	fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
		let this = self.get_mut();
		if this.finished {
			return Poll::Ready(None);
		}

		this.body.waker.register(cx.waker());
		if this.body.closed.load(Ordering::SeqCst) {
			this.finished = true;
			this.closed_by_manager = true;
			return Poll::Ready(None);
		}

		let mut slot = this.body.stream.lock();
		let Some(stream) = slot.as_mut() else {
			this.finished = true;
			return Poll::Ready(None);
		};
		let next = stream.as_mut().poll_next(cx);
		if matches!(next, Poll::Ready(None)) {
			*slot = None;
			this.finished = true;
		}
		next
	}
}

impl fmt::Debug for SessionStream {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SessionStream")
			.field("id", &self.id)
			.field("finished", &self.finished)
			.field("closed_by_manager", &self.closed_by_manager)
			.finish()
	}
}

/// How a session's stream ended, as reported by the consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
	/// The server finished the stream normally.
	Completed,
	/// The stream errored or the server delivered an error.
	Failed(String),
	/// The consumer dropped its [`SessionEnded`] handle without reporting.
	Abandoned,
}

/// One-shot signal the consumer uses to report the end of a session.
///
/// Exactly one end is delivered per session: calling [`complete`](Self::complete)
/// or [`fail`](Self::fail) consumes the handle, and dropping it unreported
/// delivers [`SessionEnd::Abandoned`].
pub struct SessionEnded {
	session_id: SessionId,
	commands: mpsc::UnboundedSender<Command>,
	reported: bool,
}

impl SessionEnded {
	pub(crate) fn new(session_id: SessionId, commands: mpsc::UnboundedSender<Command>) -> Self {
		Self {
			session_id,
			commands,
			reported: false,
		}
	}

	pub fn session_id(&self) -> SessionId {
		self.session_id
	}

	/// The server closed the stream.
	pub fn complete(mut self) {
		self.report(SessionEnd::Completed);
	}

	/// The stream failed with `message`.
	pub fn fail(mut self, message: impl Into<String>) {
		self.report(SessionEnd::Failed(message.into()));
	}

	fn report(&mut self, end: SessionEnd) {
		if std::mem::replace(&mut self.reported, true) {
			return;
		}
		let _ = self.commands.send(Command::SessionEnded {
			session_id: self.session_id,
			end,
		});
	}
}

impl Drop for SessionEnded {
	fn drop(&mut self) {
		self.report(SessionEnd::Abandoned);
	}
}

impl fmt::Debug for SessionEnded {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SessionEnded")
			.field("session_id", &self.session_id)
			.field("reported", &self.reported)
			.finish()
	}
}

/// Consumer of an open session's bytes.
///
/// Detects and applies config updates and notifies listeners. Must report the
/// end of the stream through `ended` exactly once and never decides retry
/// timing itself. Called outside the manager lock; long-running work belongs
/// on a spawned task.
pub trait AutoFetchConsumer: Send + Sync {
	fn attach(&self, stream: SessionStream, listeners: Listeners, ended: SessionEnded);
}
