//! One-shot readiness signal
//!
//! Set once by the stream task when the first full dataset lands (or when the
//! stream gives up for good), observed by any number of readers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Notify;

/// A flag that flips from false to true exactly once and wakes all waiters
#[derive(Debug, Default)]
pub struct ReadinessGate {
    signaled: AtomicBool,
    notify: Notify,
}

impl ReadinessGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal readiness
    ///
    /// Returns true only for the call that performed the transition.
    pub fn set(&self) -> bool {
        if self.signaled.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.notify.notify_waiters();
        true
    }

    pub fn is_set(&self) -> bool {
        self.signaled.load(Ordering::Acquire)
    }

    /// Wait until the gate is set
    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking the flag so a concurrent `set` can't slip between.
            notified.as_mut().enable();
            if self.is_set() {
                return;
            }
            notified.await;
        }
    }

    /// Wait until the gate is set or `timeout` elapses
    ///
    /// Returns whether the gate was set.
    pub async fn wait_timeout(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.wait()).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_set_once() {
        let gate = ReadinessGate::new();
        assert!(!gate.is_set());

        assert!(gate.set());
        assert!(!gate.set());
        assert!(gate.is_set());
    }

    #[tokio::test]
    async fn test_wait_returns_immediately_when_set() {
        let gate = ReadinessGate::new();
        gate.set();
        assert!(gate.wait_timeout(Duration::from_millis(10)).await);
    }

    #[tokio::test]
    async fn test_wait_timeout_expires() {
        let gate = ReadinessGate::new();
        assert!(!gate.wait_timeout(Duration::from_millis(20)).await);
    }

    #[tokio::test]
    async fn test_wakes_all_waiters() {
        let gate = Arc::new(ReadinessGate::new());

        let waiters: Vec<_> = (0..8)
            .map(|_| {
                let gate = Arc::clone(&gate);
                tokio::spawn(async move { gate.wait_timeout(Duration::from_secs(5)).await })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(20)).await;
        gate.set();

        for waiter in waiters {
            assert!(waiter.await.unwrap());
        }
    }

    #[tokio::test]
    async fn test_concurrent_setters_single_transition() {
        let gate = Arc::new(ReadinessGate::new());

        let setters: Vec<_> = (0..16)
            .map(|_| {
                let gate = Arc::clone(&gate);
                tokio::spawn(async move { gate.set() })
            })
            .collect();

        let mut transitions = 0;
        for setter in setters {
            if setter.await.unwrap() {
                transitions += 1;
            }
        }
        assert_eq!(transitions, 1);
    }
}
