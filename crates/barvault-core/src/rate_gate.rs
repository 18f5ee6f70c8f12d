use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Pipeline-wide throttle for calls to the market source.
///
/// Every clone shares one schedule, so a resolver and a fetcher holding
/// clones of the same gate are spaced against each other. Permits are
/// granted one at a time (burst of one) at the configured interval.
#[derive(Clone)]
pub struct RateGate {
    limiter: Arc<DirectRateLimiter>,
    interval: Duration,
}

impl RateGate {
    pub fn new(interval: Duration) -> Self {
        let interval = interval.max(MIN_INTERVAL);
        let quota = Quota::with_period(interval).expect("period is always greater than zero");
        Self {
            limiter: Arc::new(RateLimiter::direct(quota)),
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until the next permit is available. Never fails.
    pub async fn acquire(&self) {
        self.limiter.until_ready().await;
    }
}

impl std::fmt::Debug for RateGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateGate")
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}
