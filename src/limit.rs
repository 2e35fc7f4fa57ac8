//! Sliding-window rate limiting for outbound API calls.
//!
//! The limiter keeps an explicit ledger of grant instants behind an async mutex.
//! The mutex's waiter queue doubles as the FIFO line: a caller holding the ledger
//! sleeps until the oldest grant ages out of the window, records its own grant,
//! and releases the lock to the next arrival. A caller dropped while waiting
//! records nothing.

// std
use std::{collections::VecDeque, time::Duration as StdDuration};
// crates.io
use tokio::time::{self, Instant};
// self
use crate::_prelude::*;

/// Grants-per-window budget for a [`SlidingWindowLimiter`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LimiterConfig {
	capacity: usize,
	window: Duration,
}
impl LimiterConfig {
	/// Validates and builds a budget of `capacity` grants per trailing `window`.
	pub fn new(capacity: usize, window: Duration) -> Result<Self, LimiterConfigError> {
		if capacity == 0 {
			return Err(LimiterConfigError::ZeroCapacity);
		}
		if !window.is_positive() {
			return Err(LimiterConfigError::EmptyWindow);
		}

		Ok(Self { capacity, window })
	}

	/// Budget of `capacity` grants per minute.
	pub fn per_minute(capacity: usize) -> Result<Self, LimiterConfigError> {
		Self::new(capacity, Duration::seconds(60))
	}

	/// The osu! API v2 default budget of 1200 requests per minute.
	pub fn osu_default() -> Self {
		Self { capacity: 1200, window: Duration::seconds(60) }
	}

	/// Maximum grants within any trailing window.
	pub fn capacity(&self) -> usize {
		self.capacity
	}

	/// Trailing window duration.
	pub fn window(&self) -> Duration {
		self.window
	}
}

/// Rejections raised by [`LimiterConfig::new`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, ThisError)]
pub enum LimiterConfigError {
	/// Capacity must allow at least one grant.
	#[error("Rate limiter capacity must be positive.")]
	ZeroCapacity,
	/// Window must span a positive duration.
	#[error("Rate limiter window must be positive.")]
	EmptyWindow,
}

/// In-memory sliding-window limiter; state resets with the process.
#[derive(Debug)]
pub struct SlidingWindowLimiter {
	capacity: usize,
	window: StdDuration,
	ledger: AsyncMutex<VecDeque<Instant>>,
}
impl SlidingWindowLimiter {
	/// Builds a limiter for the provided budget.
	pub fn new(config: LimiterConfig) -> Self {
		Self {
			capacity: config.capacity,
			window: config.window.unsigned_abs(),
			ledger: AsyncMutex::new(VecDeque::with_capacity(config.capacity)),
		}
	}

	/// Suspends until a grant fits under the sliding window, then records it.
	///
	/// Waiters are released in arrival order. The grant is recorded only on
	/// return, so abandoning the future at any suspension point consumes nothing.
	pub async fn acquire(&self) {
		let mut ledger = self.ledger.lock().await;

		loop {
			let now = Instant::now();

			Self::prune(&mut ledger, now, self.window);

			if ledger.len() < self.capacity {
				ledger.push_back(now);

				return;
			}

			// Full window: the next slot opens when the oldest grant ages out.
			if let Some(oldest) = ledger.front() {
				time::sleep_until(*oldest + self.window).await;
			}
		}
	}

	/// Number of grants currently inside the trailing window.
	pub async fn in_window(&self) -> usize {
		let mut ledger = self.ledger.lock().await;

		Self::prune(&mut ledger, Instant::now(), self.window);

		ledger.len()
	}

	fn prune(ledger: &mut VecDeque<Instant>, now: Instant, window: StdDuration) {
		while let Some(oldest) = ledger.front() {
			if now.duration_since(*oldest) < window {
				break;
			}

			ledger.pop_front();
		}
	}
}
