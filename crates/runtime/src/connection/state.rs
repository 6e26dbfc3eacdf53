//! Observable connection state and counters.

use std::fmt;

/// Phase of the connection state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
	/// No session and none being opened.
	#[default]
	Idle,
	/// An open attempt is in flight.
	Opening,
	/// A session is open and attached to the auto-fetch consumer.
	Active,
	/// A retry timer is pending.
	RetryScheduled,
	/// Retries exhausted and reported to listeners.
	Failed,
}

impl ConnectionState {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Idle => "idle",
			Self::Opening => "opening",
			Self::Active => "active",
			Self::RetryScheduled => "retry_scheduled",
			Self::Failed => "failed",
		}
	}
}

impl fmt::Display for ConnectionState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Lifetime counters for one manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectionStats {
	/// Open attempts started, successful or not.
	pub open_attempts: u64,
	pub sessions_opened: u64,
	pub sessions_closed: u64,
	pub retries_scheduled: u64,
	/// Failure episodes reported to listeners.
	pub failures_propagated: u64,
}

impl ConnectionStats {
	/// Sessions opened and not yet closed. Never more than one.
	pub fn sessions_open(&self) -> u64 {
		self.sessions_opened - self.sessions_closed
	}
}
