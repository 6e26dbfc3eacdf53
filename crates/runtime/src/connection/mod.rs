//! Connection manager for the realtime stream.
//!
//! Keeps at most one stream open per manager and reconnects with randomized
//! exponential backoff when opens fail or the server ends the stream.
//!
//! # State machine
//!
//! ```text
//!            add listener                 open ok
//!   Idle ───────────────────► Opening ─────────────► Active
//!    ▲                         │  ▲                    │
//!    │ close / last listener   │  │ timer fires        │ session ended
//!    │ removed (any state)     │  │ (guard re-checked) │ (close, then retry)
//!    │                         ▼  │                    │
//!    │                    RetryScheduled ◄─────────────┘
//!    │                         │
//!    │                         │ retries exhausted
//!    └──── new listener ◄── Failed   (error reported once to every listener)
//! ```
//!
//! # Concurrency
//!
//! Listener set, session slot, retry policy and phase live together behind
//! one lock, so "is a session open" and "how many retries remain" are never
//! read apart. Every transition runs on a single worker task fed through a
//! command channel: listener registration and removal only mutate the set
//! and enqueue a command. The lock is never held across an await or while
//! calling listeners or the consumer.
//!
//! An open attempt keeps reading the command queue: a close or shutdown that
//! arrives mid-attempt abandons it, and `open_timeout` bounds an attempt the
//! server never answers.

mod state;


use std::collections::BTreeMap;
use std::future::pending;
use std::ops::ControlFlow;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Sleep;
use tracing::{debug, error, info, warn};

pub use state::{ConnectionState, ConnectionStats};

use crate::config::ManagerConfig;
use crate::error::{Error, Result};
use crate::listener::{Listener, ListenerId, ListenerRegistration, Listeners};
use crate::provider::{InstallationAuth, PlatformIdentity, TemplateVersionSource};
use crate::request::RequestBuilder;
use crate::retry::{RetryPolicy, RetrySnapshot};
use crate::session::{
	AutoFetchConsumer, Session, SessionEnd, SessionEnded, SessionId, SessionStream, close_session,
};
use crate::transport::StreamTransport;

/// External components the manager depends on.
#[derive(Clone)]
pub struct Collaborators {
	pub versions: Arc<dyn TemplateVersionSource>,
	pub auth: Arc<dyn InstallationAuth>,
	pub identity: Arc<dyn PlatformIdentity>,
	pub transport: Arc<dyn StreamTransport>,
	pub consumer: Arc<dyn AutoFetchConsumer>,
}

/// Why a close was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CloseReason {
	/// The owner asked for the stream to close.
	Explicit,
	/// The last listener was removed. Ignored if one was added since.
	NoListeners,
}

/// Work items for the manager's worker task.
#[derive(Debug)]
pub(crate) enum Command {
	Begin,
	SessionEnded { session_id: SessionId, end: SessionEnd },
	Close(CloseReason),
	Shutdown,
}

/// Outcome of evaluating whether an open may start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OpenGuard {
	Open,
	SessionActive,
	NoListeners,
	Stopped,
}

pub(crate) struct State {
	listeners: BTreeMap<ListenerId, Arc<dyn Listener>>,
	session: Option<Session>,
	retry: RetryPolicy,
	phase: ConnectionState,
	phase_tx: watch::Sender<ConnectionState>,
	stats: ConnectionStats,
	stopped: bool,
	next_listener_id: u64,
	next_session_id: u64,
}

impl State {
	fn new(retry: RetryPolicy) -> Self {
		let (phase_tx, _) = watch::channel(ConnectionState::Idle);
		Self {
			listeners: BTreeMap::new(),
			session: None,
			retry,
			phase: ConnectionState::Idle,
			phase_tx,
			stats: ConnectionStats::default(),
			stopped: false,
			next_listener_id: 0,
			next_session_id: 0,
		}
	}

	/// Open guard. A live session takes precedence over an empty listener set.
	fn open_guard(&self) -> OpenGuard {
		if self.stopped {
			OpenGuard::Stopped
		} else if self.session.is_some() {
			OpenGuard::SessionActive
		} else if self.listeners.is_empty() {
			OpenGuard::NoListeners
		} else {
			OpenGuard::Open
		}
	}

	fn can_open(&self) -> bool {
		self.open_guard() == OpenGuard::Open
	}

	fn transition(&mut self, to: ConnectionState) {
		if self.phase == to {
			return;
		}
		debug!(target = "rcstream.manager", from = %self.phase, %to, "state transition");
		self.phase = to;
		self.phase_tx.send_replace(to);
	}

	fn listener_snapshot(&self) -> Vec<Arc<dyn Listener>> {
		self.listeners.values().cloned().collect()
	}

	fn close_current(&mut self) -> bool {
		let closed = close_session(&mut self.session);
		if closed {
			self.stats.sessions_closed += 1;
		}
		closed
	}
}

pub(crate) struct Shared {
	state: Mutex<State>,
	commands: mpsc::UnboundedSender<Command>,
}

impl Shared {
	pub(crate) fn listener_snapshot(&self) -> Vec<Arc<dyn Listener>> {
		self.state.lock().listener_snapshot()
	}

	fn send(&self, command: Command) {
		if let Err(e) = self.commands.send(command) {
			debug!(target = "rcstream.manager", command = ?e.0, "worker stopped; command dropped");
		}
	}

	fn try_send(&self, command: Command) -> Result<()> {
		self.commands.send(command).map_err(|_| Error::ManagerClosed)
	}

	/// Decides whether a close received mid-attempt abandons the attempt; if
	/// so, moves to `Idle` under the same lock.
	fn cancel_open(&self, reason: CloseReason) -> bool {
		let mut state = self.state.lock();
		if reason == CloseReason::NoListeners && !state.listeners.is_empty() {
			return false;
		}
		state.transition(ConnectionState::Idle);
		true
	}
}

/// Removes a listener; closes the stream when it was the last one.
pub(crate) fn remove_listener(shared: &Shared, id: ListenerId) -> bool {
	let (removed, now_empty) = {
		let mut state = shared.state.lock();
		let removed = state.listeners.remove(&id).is_some();
		(removed, removed && state.listeners.is_empty())
	};
	if now_empty {
		debug!(target = "rcstream.manager", "last listener removed; closing stream");
		shared.send(Command::Close(CloseReason::NoListeners));
	}
	removed
}

fn same_listener(a: &Arc<dyn Listener>, b: &Arc<dyn Listener>) -> bool {
	std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Maintains the single realtime stream for one namespace.
///
/// Must be started inside a Tokio runtime. Dropping the manager stops its
/// worker; use [`shutdown`](Self::shutdown) to also wait for it.
pub struct ConnectionManager {
	shared: Arc<Shared>,
	worker: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionManager {
	/// Starts a manager with a retry policy seeded from OS entropy.
	pub fn start(config: ManagerConfig, collaborators: Collaborators) -> Self {
		let retry = RetryPolicy::new(config.retry.clone());
		Self::start_with_policy(config, collaborators, retry)
	}

	/// Starts a manager with the given retry policy, e.g. one with a seeded RNG.
	pub fn start_with_policy(config: ManagerConfig, collaborators: Collaborators, retry: RetryPolicy) -> Self {
		let (commands, command_rx) = mpsc::unbounded_channel();
		let shared = Arc::new(Shared {
			state: Mutex::new(State::new(retry)),
			commands,
		});

		let Collaborators {
			versions,
			auth,
			identity,
			transport,
			consumer,
		} = collaborators;

		let worker = Worker {
			shared: Arc::clone(&shared),
			commands: command_rx,
			builder: RequestBuilder::new(&config, versions, auth, identity),
			open_timeout: config.open_timeout,
			transport,
			consumer,
			retry_timer: None,
		};
		let handle = tokio::spawn(worker.run());

		info!(
			target = "rcstream.manager",
			namespace = %config.namespace,
			endpoint = %config.endpoint,
			"connection manager started"
		);

		Self {
			shared,
			worker: Mutex::new(Some(handle)),
		}
	}

	/// Registers a listener and opens the stream if none is open.
	///
	/// Registering the same `Arc` again returns a handle to the existing entry.
	pub fn add_listener(&self, listener: Arc<dyn Listener>) -> ListenerRegistration {
		let (id, begin) = {
			let mut state = self.shared.state.lock();
			let existing = state
				.listeners
				.iter()
				.find(|&(_, registered)| same_listener(registered, &listener))
				.map(|(id, _)| *id);
			let id = match existing {
				Some(id) => id,
				None => {
					let id = ListenerId(state.next_listener_id);
					state.next_listener_id += 1;
					state.listeners.insert(id, listener);
					id
				}
			};
			(id, state.can_open())
		};

		if begin {
			self.shared.send(Command::Begin);
		}
		ListenerRegistration::new(id, Arc::downgrade(&self.shared))
	}

	/// Removes a listener by id. Returns false if it was not registered.
	pub fn remove_listener(&self, id: ListenerId) -> bool {
		remove_listener(&self.shared, id)
	}

	pub fn listener_count(&self) -> usize {
		self.shared.state.lock().listeners.len()
	}

	pub fn state(&self) -> ConnectionState {
		self.shared.state.lock().phase
	}

	/// Subscribes to state transitions.
	pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
		self.shared.state.lock().phase_tx.subscribe()
	}

	pub fn stats(&self) -> ConnectionStats {
		self.shared.state.lock().stats
	}

	pub fn retry_snapshot(&self) -> RetrySnapshot {
		self.shared.state.lock().retry.snapshot()
	}

	pub fn is_session_open(&self) -> bool {
		self.shared.state.lock().session.as_ref().is_some_and(Session::is_open)
	}

	/// Requests an open if listeners are registered and no stream is open.
	///
	/// Resumes after [`close`](Self::close), or starts a fresh retry cycle
	/// after a failure.
	///
	/// # Errors
	///
	/// Returns [`Error::ManagerClosed`] once the worker has stopped.
	pub fn begin(&self) -> Result<()> {
		self.shared.try_send(Command::Begin)
	}

	/// Closes any open stream and cancels a pending retry. Listeners stay registered.
	///
	/// # Errors
	///
	/// Returns [`Error::ManagerClosed`] once the worker has stopped.
	pub fn close(&self) -> Result<()> {
		self.shared.try_send(Command::Close(CloseReason::Explicit))
	}

	/// Closes the stream, stops the worker and waits for it to exit.
	pub async fn shutdown(&self) {
		self.shared.send(Command::Shutdown);
		let handle = self.worker.lock().take();
		if let Some(handle) = handle {
			if let Err(e) = handle.await {
				warn!(target = "rcstream.manager", error = %e, "worker task ended abnormally");
			}
		}
	}

	pub fn is_shut_down(&self) -> bool {
		self.shared.state.lock().stopped
	}
}

impl Drop for ConnectionManager {
	fn drop(&mut self) {
		if self.worker.get_mut().is_some() {
			self.shared.send(Command::Shutdown);
		}
	}
}

impl std::fmt::Debug for ConnectionManager {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let state = self.shared.state.lock();
		f.debug_struct("ConnectionManager")
			.field("state", &state.phase)
			.field("listeners", &state.listeners.len())
			.field("session_open", &state.session.is_some())
			.field("retry", &state.retry.snapshot())
			.finish()
	}
}

/// What to do after an attempt failed or a session ended.
enum RetryPlan {
	Scheduled(Duration),
	Exhausted(Vec<Arc<dyn Listener>>),
	Idle,
}

fn plan_retry(state: &mut State) -> RetryPlan {
	if state.stopped {
		return RetryPlan::Idle;
	}
	if state.listeners.is_empty() {
		state.transition(ConnectionState::Idle);
		return RetryPlan::Idle;
	}

	match state.retry.next_delay() {
		Some(delay) => {
			state.stats.retries_scheduled += 1;
			state.transition(ConnectionState::RetryScheduled);
			info!(
				target = "rcstream.manager",
				delay_secs = delay.as_secs(),
				retries_remaining = state.retry.retries_remaining(),
				"retry scheduled"
			);
			RetryPlan::Scheduled(delay)
		}
		None => {
			state.stats.failures_propagated += 1;
			state.transition(ConnectionState::Failed);
			error!(
				target = "rcstream.manager",
				listeners = state.listeners.len(),
				"retries exhausted; reporting to listeners"
			);
			RetryPlan::Exhausted(state.listener_snapshot())
		}
	}
}

async fn retry_elapsed(timer: &mut Option<Pin<Box<Sleep>>>) {
	match timer {
		Some(sleep) => sleep.as_mut().await,
		None => pending().await,
	}
}

/// How an in-flight open attempt ended.
enum Attempt {
	Finished(Result<(Session, SessionStream)>),
	Cancelled(CloseReason),
	Shutdown,
}

async fn open_session(
	builder: &RequestBuilder,
	transport: &dyn StreamTransport,
	open_timeout: Duration,
	session_id: SessionId,
) -> Result<(Session, SessionStream)> {
	let request = builder.build().await?;
	match tokio::time::timeout(open_timeout, Session::open(session_id, transport, &request)).await {
		Ok(opened) => opened,
		Err(_) => Err(Error::TransportOpen(format!(
			"no response within {}s",
			open_timeout.as_secs()
		))),
	}
}

/// Serial executor of every state transition.
struct Worker {
	shared: Arc<Shared>,
	commands: mpsc::UnboundedReceiver<Command>,
	builder: RequestBuilder,
	open_timeout: Duration,
	transport: Arc<dyn StreamTransport>,
	consumer: Arc<dyn AutoFetchConsumer>,
	retry_timer: Option<Pin<Box<Sleep>>>,
}

impl Worker {
	async fn run(mut self) {
		loop {
			tokio::select! {
				command = self.commands.recv() => match command {
					Some(Command::Begin) => {
						if self.on_begin().await.is_break() {
							break;
						}
					}
					Some(Command::SessionEnded { session_id, end }) => self.on_session_ended(session_id, end),
					Some(Command::Close(reason)) => self.on_close(reason),
					Some(Command::Shutdown) | None => {
						self.on_shutdown();
						break;
					}
				},
				() = retry_elapsed(&mut self.retry_timer) => {
					self.retry_timer = None;
					debug!(target = "rcstream.manager", "retry timer fired");
					if self.begin_stream().await.is_break() {
						break;
					}
				}
			}
		}
		debug!(target = "rcstream.manager", "worker exited");
	}

	async fn on_begin(&mut self) -> ControlFlow<()> {
		{
			let mut state = self.shared.state.lock();
			if state.stopped {
				return ControlFlow::Continue(());
			}
			if self.retry_timer.is_some() {
				debug!(target = "rcstream.manager", "open requested while retry pending; waiting for timer");
				return ControlFlow::Continue(());
			}
			if state.retry.is_exhausted() {
				debug!(target = "rcstream.manager", "starting a fresh retry cycle");
				state.retry.reset();
			}
		}
		self.begin_stream().await
	}

	/// Runs one open attempt. Breaks if a shutdown arrived during it.
	async fn begin_stream(&mut self) -> ControlFlow<()> {
		let shared = Arc::clone(&self.shared);
		let session_id = {
			let mut state = shared.state.lock();
			match state.open_guard() {
				OpenGuard::Open => {}
				OpenGuard::SessionActive => {
					debug!(target = "rcstream.manager", "session already active; open skipped");
					return ControlFlow::Continue(());
				}
				OpenGuard::NoListeners => {
					debug!(target = "rcstream.manager", "no listeners; open skipped");
					state.transition(ConnectionState::Idle);
					return ControlFlow::Continue(());
				}
				OpenGuard::Stopped => return ControlFlow::Continue(()),
			}
			state.stats.open_attempts += 1;
			state.transition(ConnectionState::Opening);
			let id = SessionId(state.next_session_id);
			state.next_session_id += 1;
			id
		};

		let attempt = {
			let open = open_session(&self.builder, self.transport.as_ref(), self.open_timeout, session_id);
			tokio::pin!(open);
			loop {
				let command = tokio::select! {
					biased;
					opened = &mut open => break Attempt::Finished(opened),
					command = self.commands.recv() => command,
				};
				match command {
					Some(Command::Close(reason)) if self.shared.cancel_open(reason) => break Attempt::Cancelled(reason),
					Some(Command::Shutdown) | None => break Attempt::Shutdown,
					Some(command) => {
						debug!(target = "rcstream.manager", ?command, "open in progress; command ignored");
					}
				}
			}
		};

		let opened = match attempt {
			Attempt::Finished(opened) => opened,
			Attempt::Cancelled(reason) => {
				info!(
					target = "rcstream.manager",
					session_id = session_id.as_u64(),
					?reason,
					"open attempt abandoned"
				);
				return ControlFlow::Continue(());
			}
			Attempt::Shutdown => {
				self.on_shutdown();
				return ControlFlow::Break(());
			}
		};

		let mut state = shared.state.lock();
		match opened {
			Ok((session, stream)) => {
				if state.listeners.is_empty() {
					debug!(
						target = "rcstream.manager",
						session_id = session_id.as_u64(),
						"listeners left while opening; discarding session"
					);
					drop(session);
					state.transition(ConnectionState::Idle);
					return ControlFlow::Continue(());
				}

				state.retry.reset();
				state.session = Some(session);
				state.stats.sessions_opened += 1;
				state.transition(ConnectionState::Active);
				drop(state);

				info!(
					target = "rcstream.manager",
					session_id = session_id.as_u64(),
					"realtime stream open"
				);
				self.attach(session_id, stream);
			}
			Err(e) => {
				warn!(
					target = "rcstream.manager",
					session_id = session_id.as_u64(),
					error = %e,
					kind = ?e.kind(),
					"failed to open realtime stream"
				);
				let plan = plan_retry(&mut state);
				drop(state);
				self.apply(plan);
			}
		}
		ControlFlow::Continue(())
	}

	fn attach(&self, session_id: SessionId, stream: SessionStream) {
		let listeners = Listeners::new(Arc::downgrade(&self.shared));
		let ended = SessionEnded::new(session_id, self.shared.commands.clone());
		self.consumer.attach(stream, listeners, ended);
	}

	fn on_session_ended(&mut self, session_id: SessionId, end: SessionEnd) {
		let shared = Arc::clone(&self.shared);
		let mut state = shared.state.lock();
		if state.session.as_ref().map(Session::id) != Some(session_id) {
			debug!(
				target = "rcstream.manager",
				session_id = session_id.as_u64(),
				"end signal for a session that is no longer current; ignored"
			);
			return;
		}

		state.close_current();
		let reason = match &end {
			SessionEnd::Completed => "server closed the stream".to_string(),
			SessionEnd::Failed(message) => message.clone(),
			SessionEnd::Abandoned => "consumer dropped the session".to_string(),
		};
		let err = Error::StreamTerminated(reason);
		if end == SessionEnd::Completed {
			info!(target = "rcstream.manager", session_id = session_id.as_u64(), "{err}; reconnecting");
		} else {
			warn!(target = "rcstream.manager", session_id = session_id.as_u64(), "{err}; reconnecting");
		}

		let plan = plan_retry(&mut state);
		drop(state);
		self.apply(plan);
	}

	fn on_close(&mut self, reason: CloseReason) {
		let mut state = self.shared.state.lock();
		if reason == CloseReason::NoListeners && !state.listeners.is_empty() {
			debug!(target = "rcstream.manager", "listener re-added before close; keeping stream");
			return;
		}

		self.retry_timer = None;
		if state.close_current() {
			info!(target = "rcstream.manager", ?reason, "realtime stream closed");
		}
		if !state.stopped {
			state.transition(ConnectionState::Idle);
		}
	}

	fn on_shutdown(&mut self) {
		self.retry_timer = None;
		let mut state = self.shared.state.lock();
		state.stopped = true;
		state.close_current();
		state.transition(ConnectionState::Idle);
		info!(target = "rcstream.manager", "connection manager stopped");
	}

	fn apply(&mut self, plan: RetryPlan) {
		match plan {
			RetryPlan::Scheduled(delay) => {
				self.retry_timer = Some(Box::pin(tokio::time::sleep(delay)));
			}
			RetryPlan::Exhausted(listeners) => {
				let err = Error::RetriesExhausted;
				let message = err.to_string();
				for listener in &listeners {
					listener.on_error(err.kind(), &message);
				}
			}
			RetryPlan::Idle => {}
		}
	}
}
