/// Consecutive failed polls for one session.
///
/// A successful fetch resets the streak. With no limit configured the
/// streak is informational only and polling never gives up on its own.
#[derive(Debug, Clone)]
pub struct ErrorStreak {
    consecutive_failures: u32,
    limit: Option<u32>,
}

impl ErrorStreak {
    pub fn new(limit: Option<u32>) -> Self {
        Self {
            consecutive_failures: 0,
            limit,
        }
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    pub fn record_failure(&mut self) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn is_exhausted(&self) -> bool {
        self.limit
            .is_some_and(|limit| self.consecutive_failures >= limit)
    }
}

impl Default for ErrorStreak {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let streak = ErrorStreak::new(Some(3));
        assert_eq!(streak.consecutive_failures(), 0);
        assert!(!streak.is_exhausted());
    }

    #[test]
    fn test_exhausted_at_limit() {
        let mut streak = ErrorStreak::new(Some(3));

        streak.record_failure();
        streak.record_failure();
        assert!(!streak.is_exhausted());

        streak.record_failure();
        assert!(streak.is_exhausted());
    }

    #[test]
    fn test_success_resets_streak() {
        let mut streak = ErrorStreak::new(Some(2));

        streak.record_failure();
        streak.record_success();
        streak.record_failure();

        assert_eq!(streak.consecutive_failures(), 1);
        assert!(!streak.is_exhausted());
    }

    #[test]
    fn test_unlimited_never_exhausts() {
        let mut streak = ErrorStreak::default();

        for _ in 0..1000 {
            streak.record_failure();
        }

        assert_eq!(streak.consecutive_failures(), 1000);
        assert!(!streak.is_exhausted());
    }
}
