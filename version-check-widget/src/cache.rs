use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use version_check_client::{STATUS_QUERY_KEY, StatusApi, StatusResponse, VersionCheckError};

use crate::config::WidgetConfig;

/// What subscribers see of the status entry at a point in time.
#[derive(Debug, Clone, Default)]
pub struct CacheSnapshot {
    /// Last successfully fetched status. Kept when a later fetch fails.
    pub data: Option<StatusResponse>,
    /// Error of the most recent fetch, cleared by the next success.
    pub error: Option<Arc<VersionCheckError>>,
    pub is_fetching: bool,
    pub updated_at: Option<Instant>,
}

impl CacheSnapshot {
    /// Nothing has resolved yet, neither data nor an error.
    pub fn is_loading(&self) -> bool {
        self.data.is_none() && self.error.is_none()
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// A fetch that is already running in the background. Every trigger that
/// arrives while it runs gets a clone of the same handle.
#[derive(Clone)]
pub struct PendingFetch(Shared<BoxFuture<'static, CacheSnapshot>>);

impl Future for PendingFetch {
    type Output = CacheSnapshot;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.0.poll_unpin(cx)
    }
}

struct CacheState {
    data: Option<StatusResponse>,
    updated_at: Option<Instant>,
    invalidated: bool,
    error: Option<Arc<VersionCheckError>>,
    in_flight: Option<PendingFetch>,
    subscribers: usize,
    ticker: Option<JoinHandle<()>>,
}

impl CacheState {
    fn snapshot(&self) -> CacheSnapshot {
        CacheSnapshot {
            data: self.data.clone(),
            error: self.error.clone(),
            is_fetching: self.in_flight.is_some(),
            updated_at: self.updated_at,
        }
    }

    fn is_stale(&self, stale_time: Duration) -> bool {
        if self.invalidated {
            return true;
        }
        match self.updated_at {
            Some(updated_at) => updated_at.elapsed() >= stale_time,
            None => true,
        }
    }
}

struct CacheInner<A: StatusApi> {
    api: Arc<A>,
    config: WidgetConfig,
    state: Mutex<CacheState>,
    snapshots: watch::Sender<CacheSnapshot>,
}

impl<A: StatusApi> CacheInner<A> {
    fn state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &CacheState) {
        self.snapshots.send_replace(state.snapshot());
    }

    fn finish_fetch(&self, result: Result<StatusResponse, VersionCheckError>) -> CacheSnapshot {
        let mut state = self.state();
        state.in_flight = None;
        match result {
            Ok(status) => {
                log::debug!("{STATUS_QUERY_KEY} refreshed");
                state.data = Some(status);
                state.updated_at = Some(Instant::now());
                state.invalidated = false;
                state.error = None;
            }
            Err(err) => {
                log::warn!("Version status unavailable: {err}");
                state.error = Some(Arc::new(err));
            }
        }

        let snapshot = state.snapshot();
        self.snapshots.send_replace(snapshot.clone());
        snapshot
    }
}

async fn fetch_with_retry<A: StatusApi>(
    api: &A,
    config: &WidgetConfig,
) -> Result<StatusResponse, VersionCheckError> {
    let mut retries = 0;
    loop {
        match api.fetch_status().await {
            Ok(status) => return Ok(status),
            Err(err) if retries < config.retry_count => {
                retries += 1;
                log::warn!(
                    "Version status fetch failed, retrying ({retries}/{}): {err}",
                    config.retry_count
                );
                tokio::time::sleep(config.retry_delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

// The fetch only holds a weak handle on the cache, which stores the fetch in
// `in_flight`. A cache dropped mid-fetch is freed and the result goes only to
// whoever still awaits it.
async fn run_fetch<A: StatusApi>(
    cache: Weak<CacheInner<A>>,
    api: Arc<A>,
    config: WidgetConfig,
) -> CacheSnapshot {
    let result = fetch_with_retry(api.as_ref(), &config).await;

    match cache.upgrade() {
        Some(inner) => inner.finish_fetch(result),
        None => {
            log::debug!("{STATUS_QUERY_KEY} fetch finished after its cache was dropped");
            match result {
                Ok(status) => CacheSnapshot {
                    data: Some(status),
                    updated_at: Some(Instant::now()),
                    ..CacheSnapshot::default()
                },
                Err(err) => CacheSnapshot {
                    error: Some(Arc::new(err)),
                    ..CacheSnapshot::default()
                },
            }
        }
    }
}

/// Holds the single version status entry for one mounted widget.
///
/// Fetches are de-duplicated: while one is in flight, refreshes and
/// invalidations join it instead of issuing another request. Methods that
/// start a fetch spawn it, so they must be called from within a Tokio runtime.
pub struct StatusCache<A: StatusApi> {
    inner: Arc<CacheInner<A>>,
}

impl<A: StatusApi> Clone for StatusCache<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: StatusApi> StatusCache<A> {
    pub fn new(api: Arc<A>, config: WidgetConfig) -> Self {
        let (snapshots, _) = watch::channel(CacheSnapshot::default());
        Self {
            inner: Arc::new(CacheInner {
                api,
                config,
                state: Mutex::new(CacheState {
                    data: None,
                    updated_at: None,
                    invalidated: false,
                    error: None,
                    in_flight: None,
                    subscribers: 0,
                    ticker: None,
                }),
                snapshots,
            }),
        }
    }

    pub fn api(&self) -> &Arc<A> {
        &self.inner.api
    }

    pub fn snapshot(&self) -> CacheSnapshot {
        self.inner.state().snapshot()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.state().subscribers
    }

    /// Starts a background fetch, or joins the one already running.
    pub fn refresh(&self) -> PendingFetch {
        let mut state = self.inner.state();
        if let Some(pending) = &state.in_flight {
            log::debug!("Joining in-flight {STATUS_QUERY_KEY} fetch");
            return pending.clone();
        }

        let fetch = PendingFetch(
            run_fetch(
                Arc::downgrade(&self.inner),
                Arc::clone(&self.inner.api),
                self.inner.config.clone(),
            )
            .boxed()
            .shared(),
        );
        state.in_flight = Some(fetch.clone());
        self.inner.publish(&state);
        drop(state);

        tokio::spawn(fetch.clone());
        fetch
    }

    /// Marks the entry stale and re-fetches it for all current subscribers.
    pub fn invalidate(&self) -> PendingFetch {
        self.inner.state().invalidated = true;
        log::debug!("{STATUS_QUERY_KEY} invalidated");
        self.refresh()
    }

    pub fn subscribe(&self) -> StatusSubscription<A> {
        let receiver = self.inner.snapshots.subscribe();
        let stale = {
            let mut state = self.inner.state();
            state.subscribers += 1;
            if state.ticker.is_none() {
                state.ticker = self.spawn_ticker();
            }
            state.is_stale(self.inner.config.stale_time)
        };
        if stale {
            self.refresh();
        }

        StatusSubscription {
            cache: self.clone(),
            receiver,
        }
    }

    fn spawn_ticker(&self) -> Option<JoinHandle<()>> {
        let period = self.inner.config.refetch_interval;
        if period.is_zero() {
            return None;
        }

        let cache = Arc::downgrade(&self.inner);
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(inner) = cache.upgrade() else {
                    break;
                };
                log::debug!("Interval refresh of {STATUS_QUERY_KEY}");
                StatusCache { inner }.refresh();
            }
        }))
    }
}

/// A live view of the cache. Background refresh runs while at least one
/// subscription exists and stops when the last one is dropped.
pub struct StatusSubscription<A: StatusApi> {
    cache: StatusCache<A>,
    receiver: watch::Receiver<CacheSnapshot>,
}

impl<A: StatusApi> StatusSubscription<A> {
    pub fn current(&self) -> CacheSnapshot {
        self.receiver.borrow().clone()
    }

    /// Waits for the next snapshot. Cancel safe.
    pub async fn changed(&mut self) -> Option<CacheSnapshot> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }

    pub fn cache(&self) -> &StatusCache<A> {
        &self.cache
    }
}

impl<A: StatusApi> Drop for StatusSubscription<A> {
    fn drop(&mut self) {
        let mut state = self.cache.inner.state();
        state.subscribers = state.subscribers.saturating_sub(1);
        if state.subscribers == 0
            && let Some(ticker) = state.ticker.take()
        {
            log::debug!("Last subscriber gone, stopping {STATUS_QUERY_KEY} refresh");
            ticker.abort();
        }
    }
}
