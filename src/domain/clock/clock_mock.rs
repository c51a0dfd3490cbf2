use std::sync::{Arc, PoisonError, RwLock};

use crate::domain::clock::clock::Clock;

/// Manually driven clock. Clones share the same time, so a test can keep one handle and give
/// another to the scheduler.
#[derive(Debug, Clone)]
pub struct MockClock {
    time: Arc<RwLock<i64>>,
}

impl MockClock {
    pub fn new(time: i64) -> MockClock {
        MockClock { time: Arc::new(RwLock::new(time)) }
    }

    pub fn advance(&self, seconds: i64) {
        *self.time.write().unwrap_or_else(PoisonError::into_inner) += seconds;
    }

    pub fn set(&self, time: i64) {
        *self.time.write().unwrap_or_else(PoisonError::into_inner) = time;
    }
}

impl Clock for MockClock {
    fn now_in_s(&self) -> i64 {
        *self.time.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn now_in_ms(&self) -> i64 {
        self.now_in_s() * 1000
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_time() {
        let clock = MockClock::new(10);
        let handle = clock.clone();
        handle.advance(5);
        assert_eq!(clock.now_in_s(), 15);
        clock.set(100);
        assert_eq!(handle.now_in_ms(), 100_000);
    }
}
