use std::time::Duration;

use tokio::time::Instant;

/// Per-provider attempt policy. Only transient errors consume extra attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { attempts: 2, delay: Duration::from_secs(1), timeout: Duration::from_secs(60) }
    }
}

impl RetryPolicy {
    /// Attempt timeout, shortened to whatever is left before `deadline`.
    /// `None` once the deadline has passed.
    pub fn attempt_timeout(&self, deadline: Option<Instant>) -> Option<Duration> {
        match deadline {
            None => Some(self.timeout),
            Some(d) => {
                let left = d.saturating_duration_since(Instant::now());
                (!left.is_zero()).then(|| left.min(self.timeout))
            }
        }
    }
}

#[cfg(test)]
mod retry_tests {
    use std::time::Duration;

    use tokio::time::Instant;

    use super::RetryPolicy;

    #[test]
    fn test_defaults() {
        let p = RetryPolicy::default();
        assert_eq!(p.attempts, 2);
        assert_eq!(p.delay, Duration::from_secs(1));
        assert_eq!(p.timeout, Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_timeout_respects_deadline() {
        let p = RetryPolicy::default();
        assert_eq!(p.attempt_timeout(None), Some(Duration::from_secs(60)));

        let deadline = Instant::now() + Duration::from_secs(5);
        assert_eq!(p.attempt_timeout(Some(deadline)), Some(Duration::from_secs(5)));

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(p.attempt_timeout(Some(deadline)), None);
    }
}
