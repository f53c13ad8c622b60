use chrono::{TimeZone, Utc};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use version_check_client::{
    DismissResult, DismissibleWarning, StatusApi, StatusResponse, VersionCheckError,
    VersionStatus, VersionWarning, WarningLevel, WarningType,
};

/// In-memory stand-in for the version check server. Dismissing a warning
/// removes it from later status reads, like the real endpoint does.
pub(crate) struct FakeApi {
    status: Mutex<StatusResponse>,
    fetch_failures: Mutex<VecDeque<VersionCheckError>>,
    dismiss_outcomes: Mutex<VecDeque<Result<DismissResult, VersionCheckError>>>,
    fetch_delay: Duration,
    dismiss_delay: Duration,
    fetch_calls: AtomicUsize,
    dismiss_calls: Mutex<Vec<DismissibleWarning>>,
}

impl FakeApi {
    pub fn new(status: StatusResponse) -> Self {
        Self {
            status: Mutex::new(status),
            fetch_failures: Mutex::new(VecDeque::new()),
            dismiss_outcomes: Mutex::new(VecDeque::new()),
            fetch_delay: Duration::ZERO,
            dismiss_delay: Duration::ZERO,
            fetch_calls: AtomicUsize::new(0),
            dismiss_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = delay;
        self
    }

    pub fn with_dismiss_delay(mut self, delay: Duration) -> Self {
        self.dismiss_delay = delay;
        self
    }

    pub fn fail_next_fetches(&self, count: usize) {
        let mut failures = self.fetch_failures.lock().unwrap();
        for _ in 0..count {
            failures.push_back(unavailable());
        }
    }

    pub fn fail_next_dismiss(&self, outcome: Result<DismissResult, VersionCheckError>) {
        self.dismiss_outcomes.lock().unwrap().push_back(outcome);
    }

    pub fn set_status(&self, status: StatusResponse) {
        *self.status.lock().unwrap() = status;
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn dismiss_calls(&self) -> Vec<DismissibleWarning> {
        self.dismiss_calls.lock().unwrap().clone()
    }
}

impl StatusApi for FakeApi {
    async fn fetch_status(&self) -> Result<StatusResponse, VersionCheckError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if !self.fetch_delay.is_zero() {
            tokio::time::sleep(self.fetch_delay).await;
        }
        let failure = self.fetch_failures.lock().unwrap().pop_front();
        match failure {
            Some(err) => Err(err),
            None => Ok(self.status.lock().unwrap().clone()),
        }
    }

    async fn dismiss(&self, warning: DismissibleWarning) -> Result<DismissResult, VersionCheckError> {
        self.dismiss_calls.lock().unwrap().push(warning);
        if !self.dismiss_delay.is_zero() {
            tokio::time::sleep(self.dismiss_delay).await;
        }
        let scripted = self.dismiss_outcomes.lock().unwrap().pop_front();
        if let Some(outcome) = scripted {
            return outcome;
        }

        self.status.lock().unwrap().status.warning = None;
        Ok(DismissResult {
            success: true,
            dismissed_until: Some(Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap()),
            message: "Dismissed".to_string(),
        })
    }
}

pub(crate) fn unavailable() -> VersionCheckError {
    VersionCheckError::Api {
        status: 503,
        message: "unavailable".to_string(),
    }
}

pub(crate) fn warning(warning_type: WarningType, level: WarningLevel) -> VersionWarning {
    VersionWarning {
        warning_type,
        level,
        message: "Support ends soon".to_string(),
        days_remaining: Some(10),
        dismissed_until: None,
        can_dismiss: warning_type != WarningType::Yanked,
    }
}

pub(crate) fn status_with(warning: Option<VersionWarning>) -> StatusResponse {
    StatusResponse {
        status: VersionStatus {
            current_version: Some("12.1.0".to_string()),
            warning,
        },
        eom_dismissal_period_days: 30,
        eobs_dismissal_period_days: 14,
    }
}
