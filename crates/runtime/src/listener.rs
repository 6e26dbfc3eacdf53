//! Listener capability, registration handles and the shared listener view.

use std::sync::{Arc, Weak};

use crate::connection::{Shared, remove_listener};
use crate::error::ErrorKind;

/// Observer of the realtime stream.
///
/// Called from the manager's worker or the auto-fetch consumer, never while
/// the manager's state lock is held, so implementations may add or remove
/// listeners from inside a callback.
pub trait Listener: Send + Sync {
	/// A config update was detected and applied.
	fn on_update(&self);

	/// The stream failed. Delivered once per failure episode.
	fn on_error(&self, kind: ErrorKind, message: &str);
}

/// Identifier of a registered listener, unique per manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(pub(crate) u64);

impl ListenerId {
	pub fn as_u64(self) -> u64 {
		self.0
	}
}

/// Handle returned by [`ConnectionManager::add_listener`].
///
/// Dropping the handle or calling [`remove`](Self::remove) unregisters the
/// listener. When the last listener goes away the manager closes the stream.
///
/// [`ConnectionManager::add_listener`]: crate::ConnectionManager::add_listener
#[must_use = "dropping the registration removes the listener"]
pub struct ListenerRegistration {
	id: ListenerId,
	shared: Weak<Shared>,
	active: bool,
}

impl ListenerRegistration {
	pub(crate) fn new(id: ListenerId, shared: Weak<Shared>) -> Self {
		Self {
			id,
			shared,
			active: true,
		}
	}

	pub fn id(&self) -> ListenerId {
		self.id
	}

	/// Unregisters the listener, equivalent to dropping the handle.
	pub fn remove(mut self) {
		self.unregister();
	}

	fn unregister(&mut self) {
		if !std::mem::take(&mut self.active) {
			return;
		}
		if let Some(shared) = self.shared.upgrade() {
			remove_listener(&shared, self.id);
		}
	}
}

impl Drop for ListenerRegistration {
	fn drop(&mut self) {
		self.unregister();
	}
}

impl std::fmt::Debug for ListenerRegistration {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ListenerRegistration")
			.field("id", &self.id)
			.field("active", &self.active)
			.finish()
	}
}

/// Live view of the registered listeners, handed to the auto-fetch consumer.
///
/// Each call snapshots the current set under the manager lock and notifies
/// outside it, so listeners registered after the session opened still hear
/// about updates.
#[derive(Clone)]
pub struct Listeners {
	shared: Weak<Shared>,
}

impl Listeners {
	pub(crate) fn new(shared: Weak<Shared>) -> Self {
		Self { shared }
	}

	/// Current listeners in registration order. Empty once the manager is gone.
	pub fn snapshot(&self) -> Vec<Arc<dyn Listener>> {
		self.shared
			.upgrade()
			.map(|shared| shared.listener_snapshot())
			.unwrap_or_default()
	}

	/// Calls [`Listener::on_update`] on every listener; returns how many were notified.
	pub fn notify_update(&self) -> usize {
		let listeners = self.snapshot();
		for listener in &listeners {
			listener.on_update();
		}
		listeners.len()
	}
}

impl std::fmt::Debug for Listeners {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Listeners")
			.field("attached", &(self.shared.strong_count() > 0))
			.finish()
	}
}
