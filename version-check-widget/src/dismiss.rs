use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use version_check_client::{
    DismissResult, DismissibleWarning, StatusApi, VersionCheckError, WarningType,
};

use crate::cache::StatusCache;

#[derive(Error, Debug)]
pub enum DismissError {
    #[error(transparent)]
    Request(#[from] VersionCheckError),

    #[error("Dismissal was rejected: {0}")]
    Rejected(String),

    #[error("A dismissal is already in progress")]
    InFlight,

    #[error("There is no warning to dismiss")]
    NothingToDismiss,
}

impl DismissError {
    pub fn is_invalid_operation(&self) -> bool {
        matches!(
            self,
            DismissError::Request(VersionCheckError::InvalidOperation(_))
        )
    }
}

// Clears the pending flag however the dismissal future ends, including when
// it is dropped before completing.
struct PendingGuard<'a>(&'a AtomicBool);

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// The one path every dismiss control goes through.
///
/// A confirmed dismissal invalidates the status cache; the mutator never
/// guesses what the server will report next.
pub struct DismissalMutator<A: StatusApi> {
    cache: StatusCache<A>,
    pending: Arc<AtomicBool>,
}

impl<A: StatusApi> Clone for DismissalMutator<A> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            pending: Arc::clone(&self.pending),
        }
    }
}

impl<A: StatusApi> DismissalMutator<A> {
    pub fn new(cache: StatusCache<A>) -> Self {
        Self {
            cache,
            pending: Arc::new(AtomicBool::new(false)),
        }
    }

    /// True while a dismissal request is in flight; controls should be
    /// disabled for that time.
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    pub async fn dismiss(&self, warning_type: WarningType) -> Result<DismissResult, DismissError> {
        let warning = DismissibleWarning::try_from(warning_type)
            .map_err(VersionCheckError::InvalidOperation)?;

        if self.pending.swap(true, Ordering::AcqRel) {
            return Err(DismissError::InFlight);
        }
        let _pending = PendingGuard(&self.pending);

        log::info!("Dismissing {warning} warning");
        let result = self.cache.api().dismiss(warning).await.map_err(|err| {
            log::error!("Failed to dismiss {warning} warning: {err}");
            err
        })?;

        if !result.success {
            log::warn!("Server refused to dismiss {warning} warning: {}", result.message);
            return Err(DismissError::Rejected(result.message));
        }

        self.cache.invalidate();
        log::info!("{}", result.message);
        Ok(result)
    }
}
