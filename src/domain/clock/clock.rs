use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Source of "now" for grace-period deadlines.
pub trait Clock: std::fmt::Debug + Send + Sync {
    fn now_in_s(&self) -> i64;
    fn now_in_ms(&self) -> i64;
}

pub type SharedClock = Arc<dyn Clock>;

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    pub fn shared() -> SharedClock {
        Arc::new(SystemClock)
    }
}

impl Clock for SystemClock {
    fn now_in_s(&self) -> i64 {
        self.now_in_ms() / 1000
    }

    fn now_in_ms(&self) -> i64 {
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO).as_millis() as i64
    }
}
