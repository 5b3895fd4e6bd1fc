//! A debounce timer with a quiet period and a maximum total wait, meant to
//! be polled from inside a single task's `tokio::select!` loop (the Room's
//! serialization domain, §5) rather than spawning a timer task of its own.

use std::time::{Duration, Instant};

/// Tracks when a debounced action should next fire.
///
/// Call [`Self::notify`] every time the debounced event occurs. Call
/// [`Self::deadline`] from a `select!` arm (`tokio::time::sleep_until`) to
/// learn when to fire; call [`Self::fire`] once the action has run to clear
/// the pending state.
#[derive(Debug)]
pub struct DebounceTimer {
	quiet: Duration,
	max_wait: Duration,
	pending: Option<Pending>,
}

#[derive(Debug, Clone, Copy)]
struct Pending {
	first_notify: Instant,
	last_notify: Instant,
}

impl DebounceTimer {
	pub fn new(quiet: Duration, max_wait: Duration) -> Self {
		Self { quiet, max_wait, pending: None }
	}

	/// The write-back debounce used by the Persistence Binder: 2s quiet, 10s max wait.
	pub fn write_back() -> Self {
		Self::new(Duration::from_secs(2), Duration::from_secs(10))
	}

	/// Record that the debounced event happened. The leading edge never
	/// fires by itself — this only arms or extends the deadline.
	pub fn notify(&mut self) {
		let now = Instant::now();
		match &mut self.pending {
			Some(p) => p.last_notify = now,
			None => self.pending = Some(Pending { first_notify: now, last_notify: now }),
		}
	}

	/// The instant the debounced action should fire, or `None` if nothing
	/// is pending.
	pub fn deadline(&self) -> Option<Instant> {
		let p = self.pending?;
		let quiet_deadline = p.last_notify + self.quiet;
		let max_deadline = p.first_notify + self.max_wait;
		Some(quiet_deadline.min(max_deadline))
	}

	/// Clear pending state after the debounced action has run.
	pub fn fire(&mut self) {
		self.pending = None;
	}

	pub fn is_pending(&self) -> bool {
		self.pending.is_some()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn idle_timer_has_no_deadline() {
		let timer = DebounceTimer::write_back();
		assert!(timer.deadline().is_none());
	}

	#[test]
	fn notify_arms_the_quiet_deadline() {
		let mut timer = DebounceTimer::write_back();
		timer.notify();
		let deadline = timer.deadline().expect("deadline should be armed");
		assert!(deadline <= Instant::now() + Duration::from_secs(2));
	}

	#[test]
	fn fire_clears_pending_state() {
		let mut timer = DebounceTimer::write_back();
		timer.notify();
		timer.fire();
		assert!(!timer.is_pending());
	}

	#[test]
	fn repeated_notify_is_bounded_by_max_wait() {
		let mut timer = DebounceTimer::new(Duration::from_millis(50), Duration::from_millis(120));
		timer.notify();
		let first_deadline = timer.deadline().expect("armed");
		std::thread::sleep(Duration::from_millis(80));
		timer.notify();
		let second_deadline = timer.deadline().expect("still armed");
		// Quiet period alone would have pushed the deadline out further than
		// max_wait allows from the first notify.
		assert!(second_deadline <= first_deadline + Duration::from_millis(120));
	}
}

// vim: ts=4
