use std::time::Duration;

pub const AUTO_REFRESH_INTERVAL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetConfig {
    /// How often subscribed widgets re-fetch the status in the background.
    pub refetch_interval: Duration,
    /// Age after which a cached status is re-fetched on subscribe.
    pub stale_time: Duration,
    /// Automatic retries of a failed fetch before the error is reported.
    pub retry_count: u32,
    pub retry_delay: Duration,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            refetch_interval: AUTO_REFRESH_INTERVAL,
            stale_time: AUTO_REFRESH_INTERVAL,
            retry_count: 1,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl WidgetConfig {
    pub fn with_refetch_interval(mut self, interval: Duration) -> Self {
        self.refetch_interval = interval;
        self
    }

    pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = stale_time;
        self
    }

    pub fn with_retry(mut self, retry_count: u32, retry_delay: Duration) -> Self {
        self.retry_count = retry_count;
        self.retry_delay = retry_delay;
        self
    }
}
