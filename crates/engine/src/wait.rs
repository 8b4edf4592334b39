//! Busy-wait strategies for the drain barrier
//!
//! The flush thread waits for in-flight writers to leave a generation. The
//! critical section is a handful of instructions, so the wait is a spin;
//! how aggressively it spins is configurable.

use std::thread;

use crossbeam::utils::Backoff;
use tickline_config::WaitStrategy;

/// Executes one [`WaitStrategy`] step at a time
pub(crate) struct Waiter {
    strategy: WaitStrategy,
    backoff: Backoff,
}

impl Waiter {
    pub(crate) fn new(strategy: WaitStrategy) -> Self {
        Self {
            strategy,
            backoff: Backoff::new(),
        }
    }

    #[inline]
    pub(crate) fn wait(&self) {
        match self.strategy {
            WaitStrategy::Spin => std::hint::spin_loop(),
            WaitStrategy::Yield => thread::yield_now(),
            // Spins with growing step counts, then yields
            WaitStrategy::Backoff => self.backoff.snooze(),
        }
    }
}

/// Wait until `done` returns true
///
/// Returns the number of wait steps taken (zero if already done).
pub(crate) fn wait_until(strategy: WaitStrategy, mut done: impl FnMut() -> bool) -> u64 {
    let waiter = Waiter::new(strategy);
    let mut steps = 0;
    while !done() {
        waiter.wait();
        steps += 1;
    }
    steps
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[test]
    fn test_already_done() {
        for strategy in [WaitStrategy::Spin, WaitStrategy::Yield, WaitStrategy::Backoff] {
            assert_eq!(wait_until(strategy, || true), 0);
        }
    }

    #[test]
    fn test_counts_steps() {
        let mut remaining = 5;
        let steps = wait_until(WaitStrategy::Spin, || {
            remaining -= 1;
            remaining == 0
        });
        assert_eq!(steps, 4);
    }

    #[test]
    fn test_waits_for_other_thread() {
        for strategy in [WaitStrategy::Spin, WaitStrategy::Yield, WaitStrategy::Backoff] {
            let flag = Arc::new(AtomicBool::new(false));
            let setter = {
                let flag = Arc::clone(&flag);
                thread::spawn(move || {
                    thread::sleep(Duration::from_millis(10));
                    flag.store(true, Ordering::Release);
                })
            };

            let steps = wait_until(strategy, || flag.load(Ordering::Acquire));
            assert!(steps > 0);
            setter.join().unwrap();
        }
    }
}
