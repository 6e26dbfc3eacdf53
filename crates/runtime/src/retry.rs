//! Randomized exponential backoff for stream reconnection.
//!
//! A retry cycle starts with a random base delay and a full retry budget. The
//! first retry waits the base delay as-is; every later retry in the same cycle
//! multiplies the base by a random factor first. A successful open resets the
//! cycle.

use std::fmt;
use std::ops::{Range, RangeInclusive};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

/// Number of retries in a fresh cycle.
pub const DEFAULT_MAX_RETRIES: u32 = 7;

/// Configuration for [`RetryPolicy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
	/// Retries available in a fresh cycle.
	pub max_retries: u32,
	/// Range the initial backoff base (seconds) is drawn from, inclusive.
	pub initial_backoff_secs: RangeInclusive<u64>,
	/// Range the per-retry multiplier is drawn from, end exclusive.
	pub multiplier: Range<u64>,
}

impl Default for RetryConfig {
	fn default() -> Self {
		Self {
			max_retries: DEFAULT_MAX_RETRIES,
			initial_backoff_secs: 1..=5,
			multiplier: 2..5,
		}
	}
}

impl RetryConfig {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn with_max_retries(mut self, max: u32) -> Self {
		self.max_retries = max;
		self
	}

	#[must_use]
	pub fn with_initial_backoff_secs(mut self, range: RangeInclusive<u64>) -> Self {
		self.initial_backoff_secs = range;
		self
	}

	#[must_use]
	pub fn with_multiplier(mut self, range: Range<u64>) -> Self {
		self.multiplier = range;
		self
	}
}

/// Point-in-time view of the retry state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrySnapshot {
	pub retries_remaining: u32,
	pub backoff_secs: u64,
}

/// Computes reconnection delays for one stream.
///
/// Not synchronized: the connection manager keeps it behind its state lock.
pub struct RetryPolicy {
	config: RetryConfig,
	rng: Box<dyn RngCore + Send>,
	retries_remaining: u32,
	backoff_secs: u64,
}

impl RetryPolicy {
	/// Creates a policy seeded from OS entropy, already reset.
	pub fn new(config: RetryConfig) -> Self {
		Self::with_rng(config, StdRng::from_entropy())
	}

	/// Creates a policy drawing from `rng`, already reset.
	pub fn with_rng(config: RetryConfig, rng: impl RngCore + Send + 'static) -> Self {
		let mut policy = Self {
			config,
			rng: Box::new(rng),
			retries_remaining: 0,
			backoff_secs: 0,
		};
		policy.reset();
		policy
	}

	/// Starts a fresh cycle: random base delay, full retry budget.
	pub fn reset(&mut self) {
		let range = self.config.initial_backoff_secs.clone();
		self.backoff_secs = if range.is_empty() {
			*range.start()
		} else {
			self.rng.gen_range(range)
		};
		self.retries_remaining = self.config.max_retries;
	}

	/// Consumes one retry and returns how long to wait before it.
	///
	/// Returns `None` once the cycle is exhausted; the caller must then fail
	/// permanently instead of scheduling another attempt.
	pub fn next_delay(&mut self) -> Option<Duration> {
		if self.retries_remaining == 0 {
			return None;
		}
		if self.retries_remaining < self.config.max_retries {
			let factor = self.multiplier();
			self.backoff_secs = self.backoff_secs.saturating_mul(factor);
		}
		self.retries_remaining -= 1;
		Some(Duration::from_secs(self.backoff_secs))
	}

	fn multiplier(&mut self) -> u64 {
		let range = self.config.multiplier.clone();
		if range.is_empty() {
			range.start
		} else {
			self.rng.gen_range(range)
		}
	}

	pub fn retries_remaining(&self) -> u32 {
		self.retries_remaining
	}

	/// Current backoff base in seconds.
	pub fn backoff_secs(&self) -> u64 {
		self.backoff_secs
	}

	pub fn is_exhausted(&self) -> bool {
		self.retries_remaining == 0
	}

	pub fn snapshot(&self) -> RetrySnapshot {
		RetrySnapshot {
			retries_remaining: self.retries_remaining,
			backoff_secs: self.backoff_secs,
		}
	}
}

impl fmt::Debug for RetryPolicy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RetryPolicy")
			.field("config", &self.config)
			.field("retries_remaining", &self.retries_remaining)
			.field("backoff_secs", &self.backoff_secs)
			.finish()
	}
}
