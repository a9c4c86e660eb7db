//! Time source port.
//!
//! The cycle loop never touches wall-clock APIs directly; it asks a [`Clock`]
//! for the time and for sleeps, so tests can drive cycles with virtual time.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Timelike, Utc};

#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    async fn sleep(&self, duration: Duration);
}

/// Time remaining until the next wall-clock minute boundary.
pub fn until_next_minute(now: DateTime<Utc>) -> Duration {
    let into_minute =
        Duration::from_secs(u64::from(now.second())) + Duration::from_nanos(u64::from(now.nanosecond()));
    Duration::from_secs(60).saturating_sub(into_minute)
}

/// Real wall-clock time for production use.
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn until_next_minute_counts_down() {
        let t = "2026-08-31T12:00:15Z".parse::<DateTime<Utc>>().unwrap();
        assert_eq!(until_next_minute(t), Duration::from_secs(45));

        let boundary = "2026-08-31T12:00:00Z".parse::<DateTime<Utc>>().unwrap();
        assert_eq!(until_next_minute(boundary), Duration::from_secs(60));
    }
}
