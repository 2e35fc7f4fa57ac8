//! Backoff policy for retryable failures.

// std
use std::time::Duration as StdDuration;
// crates.io
use rand::Rng;
// self
use crate::_prelude::*;

/// Bounded exponential backoff with jitter.
///
/// Attempt `n` (1-based) sleeps `backoff_base * 2^(n-1)` capped at
/// `backoff_cap`, scaled by a random factor in `1 ± jitter`. A server-supplied
/// `Retry-After` hint replaces the computed delay verbatim. The defaults keep a
/// fully exhausted budget inside one limiter window.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RetryPolicy {
	/// Maximum wire attempts per call, including the first (defaults to 3).
	pub max_attempts: u32,
	/// Backoff before the second attempt (defaults to 500ms).
	pub backoff_base: Duration,
	/// Upper bound on any computed backoff (defaults to 8s).
	pub backoff_cap: Duration,
	/// Jitter fraction applied to computed delays (defaults to 0.25).
	pub jitter: f64,
}
impl RetryPolicy {
	/// Disables retries entirely: one wire attempt per call.
	pub fn none() -> Self {
		Self { max_attempts: 1, ..Self::default() }
	}

	pub(crate) fn delay_for(&self, attempt: u32, hint: Option<Duration>) -> StdDuration {
		if let Some(hint) = hint {
			return if hint.is_positive() { hint.unsigned_abs() } else { StdDuration::ZERO };
		}

		let doubled = self.backoff_base.saturating_mul(1 << attempt.saturating_sub(1).min(20));
		let capped = if doubled > self.backoff_cap { self.backoff_cap } else { doubled };
		let jittered = if self.jitter > 0.0 {
			let factor = 1.0 + rand::rng().random_range(-self.jitter..=self.jitter);

			capped * factor.max(0.0)
		} else {
			capped
		};

		if jittered.is_positive() { jittered.unsigned_abs() } else { StdDuration::ZERO }
	}
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			max_attempts: 3,
			backoff_base: Duration::milliseconds(500),
			backoff_cap: Duration::seconds(8),
			jitter: 0.25,
		}
	}
}
