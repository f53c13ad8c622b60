use std::sync::Arc;
use tokio::time::Instant;
use version_check_client::{
    DismissResult, StatusApi, StatusResponse, VersionCheckError, VersionWarning, WarningType,
};

use crate::cache::{CacheSnapshot, StatusCache, StatusSubscription};
use crate::config::WidgetConfig;
use crate::dismiss::{DismissError, DismissalMutator};
use crate::presenter::{WarningBanner, present};

#[derive(Debug, Clone, PartialEq)]
pub enum ViewState {
    Loading,
    Error,
    Empty,
    Showing(VersionWarning),
}

impl ViewState {
    /// Errors win over stale data: a failing status check shows nothing
    /// rather than an outdated warning.
    pub fn from_snapshot(snapshot: &CacheSnapshot) -> Self {
        if snapshot.is_error() {
            return ViewState::Error;
        }
        match snapshot.data.as_ref().map(StatusResponse::warning) {
            None => ViewState::Loading,
            Some(None) => ViewState::Empty,
            Some(Some(warning)) => ViewState::Showing(warning.clone()),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ViewState::Loading => "loading",
            ViewState::Error => "error",
            ViewState::Empty => "empty",
            ViewState::Showing(_) => "showing",
        }
    }
}

// A confirmed dismissal hides the banner until the cache delivers data newer
// than what was on screen when the user dismissed it.
#[derive(Debug, Clone, Copy)]
struct Collapse {
    warning_type: WarningType,
    since: Option<Instant>,
}

/// One mounted instance of the version check widget.
pub struct RootController<A: StatusApi> {
    subscription: StatusSubscription<A>,
    mutator: DismissalMutator<A>,
    snapshot: CacheSnapshot,
    collapsed: Option<Collapse>,
}

impl<A: StatusApi> RootController<A> {
    /// Creates the cache for this mount and subscribes to it, which starts the
    /// first fetch and the refresh interval.
    pub fn mount(api: Arc<A>, config: WidgetConfig) -> Self {
        let cache = StatusCache::new(api, config);
        let subscription = cache.subscribe();
        let mutator = DismissalMutator::new(cache);
        let snapshot = subscription.current();
        log::debug!("Version check widget mounted");

        Self {
            subscription,
            mutator,
            snapshot,
            collapsed: None,
        }
    }

    pub fn unmount(self) {
        log::debug!("Version check widget unmounted");
    }

    pub fn cache(&self) -> &StatusCache<A> {
        self.subscription.cache()
    }

    pub fn mutator(&self) -> &DismissalMutator<A> {
        &self.mutator
    }

    pub fn snapshot(&self) -> &CacheSnapshot {
        &self.snapshot
    }

    pub fn state(&self) -> ViewState {
        ViewState::from_snapshot(&self.snapshot)
    }

    pub fn current_version(&self) -> Option<&str> {
        self.snapshot
            .data
            .as_ref()
            .and_then(|data| data.status.current_version.as_deref())
    }

    fn is_collapsed(&self, warning: &VersionWarning) -> bool {
        self.collapsed
            .is_some_and(|collapse| collapse.warning_type == warning.warning_type)
    }

    /// The banner to draw, or `None` when the widget should render nothing.
    pub fn render(&self) -> Option<WarningBanner> {
        let ViewState::Showing(warning) = self.state() else {
            return None;
        };
        if self.is_collapsed(&warning) {
            return None;
        }

        let periods = self
            .snapshot
            .data
            .as_ref()
            .map(StatusResponse::dismissal_periods)
            .unwrap_or_default();
        Some(present(&warning, periods, self.mutator.is_pending()))
    }

    /// Waits for the cache to publish a new snapshot and returns the
    /// resulting state. Cancel safe. Returns `None` once the cache is gone.
    pub async fn changed(&mut self) -> Option<ViewState> {
        let snapshot = self.subscription.changed().await?;
        self.apply(snapshot);
        Some(self.state())
    }

    fn apply(&mut self, snapshot: CacheSnapshot) {
        if let Some(collapse) = self.collapsed
            && snapshot.updated_at != collapse.since
        {
            self.collapsed = None;
        }

        let previous = self.state();
        self.snapshot = snapshot;
        let next = self.state();
        if previous.name() != next.name() {
            log::debug!("Widget state {} -> {}", previous.name(), next.name());
        }
    }

    /// Dismisses the warning currently on screen.
    pub async fn dismiss(&mut self) -> Result<DismissResult, DismissError> {
        let ViewState::Showing(warning) = self.state() else {
            return Err(DismissError::NothingToDismiss);
        };
        if self.is_collapsed(&warning) {
            return Err(DismissError::NothingToDismiss);
        }
        if !warning.is_dismissible() {
            return Err(VersionCheckError::InvalidOperation(warning.warning_type).into());
        }

        let result = self.mutator.dismiss(warning.warning_type).await?;
        self.collapsed = Some(Collapse {
            warning_type: warning.warning_type,
            since: self.snapshot.updated_at,
        });
        Ok(result)
    }
}
