use std::time::Duration;

/// Retry policy injected into the transfer engine and the coordinator
/// client, so retry semantics live in one place instead of ad hoc counters.
///
/// Transient failures get a short fixed delay between attempts; the count
/// is bounded so a kiosk with bad luck eventually reports failure instead
/// of spinning forever.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Returns `true` when `attempt` (1-based) is the final one.
    pub fn is_last(&self, attempt: u32) -> bool {
        attempt >= self.max_attempts
    }

    /// Sleeps for the inter-attempt delay.
    pub async fn wait(&self) {
        tokio::time::sleep(self.delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let p = RetryPolicy::default();
        assert_eq!(p.max_attempts, 3);
        assert_eq!(p.delay, Duration::from_secs(2));
    }

    #[test]
    fn last_attempt_detection() {
        let p = RetryPolicy::new(3, Duration::from_millis(1));
        assert!(!p.is_last(1));
        assert!(!p.is_last(2));
        assert!(p.is_last(3));
        assert!(p.is_last(4));
    }

    #[test]
    fn at_least_one_attempt() {
        let p = RetryPolicy::new(0, Duration::from_millis(1));
        assert_eq!(p.max_attempts, 1);
    }
}
