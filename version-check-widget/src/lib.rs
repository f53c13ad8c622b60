//! Version status synchronization and dismissal for the version check widget.
//!
//! A [`RootController`] is mounted once per widget instance. It owns a
//! [`StatusCache`] that keeps the server's version status fresh, renders the
//! active warning through the presenter, and routes dismissals through the
//! [`DismissalMutator`].

pub mod cache;
pub mod config;
pub mod controller;
pub mod dismiss;
pub mod presenter;

#[cfg(test)]
mod testing;

pub use cache::{CacheSnapshot, PendingFetch, StatusCache, StatusSubscription};
pub use config::{AUTO_REFRESH_INTERVAL, WidgetConfig};
pub use controller::{RootController, ViewState};
pub use dismiss::{DismissError, DismissalMutator};
pub use presenter::{BannerIcon, BannerStatus, DismissAffordance, WarningBanner, present};
