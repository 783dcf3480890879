//! Cooperative cancellation and deadlines for the periodic workers.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct CancelState {
    cancelled: Mutex<bool>,
    cond: Condvar,
}

/// Shared shutdown flag. Cancelling wakes every thread sleeping on it.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    state: Arc<CancelState>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        let mut cancelled = self.state.cancelled.lock();
        if !*cancelled {
            *cancelled = true;
            self.state.cond.notify_all();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.state.cancelled.lock()
    }

    /// Blocks until `until` or until cancelled. Returns `true` if cancelled.
    pub fn wait_until(&self, until: Instant) -> bool {
        let mut cancelled = self.state.cancelled.lock();
        while !*cancelled {
            if self.state.cond.wait_until(&mut cancelled, until).timed_out() {
                break;
            }
        }
        *cancelled
    }
}

/// Cancels `token` on Ctrl-C (SIGINT/SIGTERM), so the server still stops,
/// flushes and reports. Can only be installed once per process.
pub fn cancel_on_interrupt(token: &CancelToken) -> Result<(), ctrlc::Error> {
    let token = token.clone();
    ctrlc::set_handler(move || token.cancel())
}

/// What a worker needs to know about when to stop: a cancel token and an
/// optional hard deadline.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    token: CancelToken,
    deadline: Option<Instant>,
}

impl RunContext {
    pub fn new(token: CancelToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Same token, no deadline.
    pub fn without_deadline(&self) -> Self {
        Self::new(self.token.clone())
    }

    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn deadline_passed(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    pub fn should_stop(&self) -> bool {
        self.token.is_cancelled() || self.deadline_passed()
    }

    /// Sleeps for `interval`, cut short by cancellation or the deadline.
    /// Returns `true` if the caller should run another tick.
    pub fn sleep(&self, interval: Duration) -> bool {
        let mut wake_at = Instant::now() + interval;
        if let Some(deadline) = self.deadline {
            wake_at = wake_at.min(deadline);
        }
        self.token.wait_until(wake_at);
        !self.should_stop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_fresh_context_keeps_running() {
        let ctx = RunContext::default();
        assert!(!ctx.should_stop());
        assert!(ctx.sleep(Duration::from_millis(1)));
    }

    #[test]
    fn test_cancel_wakes_sleeper() {
        let token = CancelToken::new();
        let ctx = RunContext::new(token.clone());

        let sleeper = thread::spawn(move || {
            let started = Instant::now();
            let keep_going = ctx.sleep(Duration::from_secs(30));
            (keep_going, started.elapsed())
        });

        thread::sleep(Duration::from_millis(50));
        token.cancel();
        let (keep_going, elapsed) = sleeper.join().unwrap();
        assert!(!keep_going);
        assert!(elapsed < Duration::from_secs(10));
    }

    #[test]
    fn test_deadline_cuts_sleep_short() {
        let ctx = RunContext::default().with_timeout(Duration::from_millis(30));
        let started = Instant::now();
        assert!(!ctx.sleep(Duration::from_secs(30)));
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(ctx.deadline_passed());
        assert!(!ctx.token().is_cancelled());
    }

    #[test]
    fn test_without_deadline_shares_token() {
        let ctx = RunContext::default().with_timeout(Duration::from_millis(0));
        let open = ctx.without_deadline();
        assert!(ctx.should_stop());
        assert!(!open.should_stop());

        ctx.token().cancel();
        assert!(open.should_stop());
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let token = CancelToken::new();
        token.cancel();
        token.cancel();
        assert!(token.is_cancelled());
        assert!(token.wait_until(Instant::now() + Duration::from_secs(30)));
    }

    // The only test in this binary that installs the process-wide handler.
    #[test]
    fn test_interrupt_handler_installs_once() {
        let token = CancelToken::new();
        cancel_on_interrupt(&token).unwrap();
        assert!(!token.is_cancelled());
        assert!(matches!(
            cancel_on_interrupt(&CancelToken::new()),
            Err(ctrlc::Error::MultipleHandlers)
        ));
    }
}
