//! Retry policies for transient bus failures.

use crate::error::BusError;
use std::num::NonZeroU32;
use std::ops::ControlFlow;
use std::time::Duration;

/// Controls how [`crate::DeviceBus`] reacts when a command fails.
pub trait RetryPolicy: Send + Sync + 'static {
    fn should_retry(&self, ctx: &RetryContext) -> ControlFlow<(), Duration>;
}

/// Context passed to [`RetryPolicy::should_retry`] on each failure.
pub struct RetryContext<'a> {
    pub fail_count: NonZeroU32,
    pub slept_so_far: Duration,
    pub error: &'a BusError,
}

/// Never retry — the default for [`crate::DeviceBus`].
pub struct NoRetries;
impl RetryPolicy for NoRetries {
    fn should_retry(&self, _: &RetryContext) -> ControlFlow<(), Duration> {
        ControlFlow::Break(())
    }
}

/// Exponentially back off on timeouts and transport errors, give up on
/// device-reported `Vacuum` errors immediately (retrying those only repeats
/// the same rejection).
pub struct AutoBackoff {
    pub initial: Duration,
    pub max: Duration,
    pub max_attempts: u32,
}

impl Default for AutoBackoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(250),
            max: Duration::from_secs(8),
            max_attempts: 4,
        }
    }
}

impl RetryPolicy for AutoBackoff {
    fn should_retry(&self, ctx: &RetryContext) -> ControlFlow<(), Duration> {
        if matches!(ctx.error, BusError::Vacuum { .. }) {
            return ControlFlow::Break(());
        }
        if ctx.fail_count.get() >= self.max_attempts {
            return ControlFlow::Break(());
        }
        let backoff = self.initial * 2u32.saturating_pow(ctx.fail_count.get() - 1);
        let backoff = backoff.min(self.max);
        log::debug!("bus error ({}) — retrying in {backoff:?}", ctx.error);
        ControlFlow::Continue(backoff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(fail_count: u32, error: &BusError) -> RetryContext {
        RetryContext {
            fail_count: NonZeroU32::new(fail_count).unwrap(),
            slept_so_far: Duration::ZERO,
            error,
        }
    }

    #[test]
    fn no_retries_always_breaks() {
        let err = BusError::Disconnected;
        assert_eq!(NoRetries.should_retry(&ctx(1, &err)), ControlFlow::Break(()));
    }

    #[test]
    fn auto_backoff_gives_up_on_vacuum_errors() {
        let err = BusError::Vacuum {
            method: "app_start".into(),
            source: crate::error::VacuumError { code: 1, message: "busy".into() },
        };
        let policy = AutoBackoff::default();
        assert_eq!(policy.should_retry(&ctx(1, &err)), ControlFlow::Break(()));
    }

    #[test]
    fn auto_backoff_doubles_each_attempt_until_capped() {
        let err = BusError::TimedOut { method: "get_status".into() };
        let policy = AutoBackoff { initial: Duration::from_millis(100), max: Duration::from_secs(1), max_attempts: 10 };
        assert_eq!(policy.should_retry(&ctx(1, &err)), ControlFlow::Continue(Duration::from_millis(100)));
        assert_eq!(policy.should_retry(&ctx(2, &err)), ControlFlow::Continue(Duration::from_millis(200)));
        assert_eq!(policy.should_retry(&ctx(3, &err)), ControlFlow::Continue(Duration::from_millis(400)));
        assert_eq!(policy.should_retry(&ctx(5, &err)), ControlFlow::Continue(Duration::from_secs(1)));
    }

    #[test]
    fn auto_backoff_stops_at_max_attempts() {
        let err = BusError::TimedOut { method: "get_status".into() };
        let policy = AutoBackoff::default();
        assert_eq!(policy.should_retry(&ctx(4, &err)), ControlFlow::Break(()));
    }
}
