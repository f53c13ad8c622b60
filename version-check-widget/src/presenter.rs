use version_check_models::{
    DEFAULT_DISMISSAL_PERIOD_DAYS, DismissalPeriods, VersionWarning, WarningLevel, WarningType,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BannerIcon {
    Shield,
    Critical,
    Caution,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BannerStatus {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DismissAffordance {
    pub warning_type: WarningType,
    pub label: &'static str,
    pub hint: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarningBanner {
    pub title: &'static str,
    pub icon: BannerIcon,
    pub status: BannerStatus,
    pub message: String,
    pub remaining: Option<String>,
    pub dismiss: Option<DismissAffordance>,
}

pub fn title_for(warning_type: WarningType) -> &'static str {
    match warning_type {
        WarningType::Eom => "End of Maintenance Warning",
        WarningType::Eobs => "End of Basic Support Warning",
        WarningType::Yanked => "Yanked Version Warning",
        WarningType::Unknown => "Version Warning",
    }
}

pub fn icon_for(warning_type: WarningType, level: WarningLevel) -> BannerIcon {
    match (warning_type, level) {
        (WarningType::Yanked, _) => BannerIcon::Shield,
        (_, WarningLevel::Critical) => BannerIcon::Critical,
        (_, WarningLevel::Warning) => BannerIcon::Caution,
    }
}

pub fn status_for(level: WarningLevel) -> BannerStatus {
    match level {
        WarningLevel::Critical => BannerStatus::Error,
        WarningLevel::Warning => BannerStatus::Warning,
    }
}

pub fn remaining_days_text(days_remaining: Option<i64>) -> Option<String> {
    match days_remaining {
        Some(days) if days > 0 => Some(format!("{days} days remaining")),
        _ => None,
    }
}

/// Builds the banner for a warning. `dismiss_pending` disables the dismiss
/// control while a request for it is in flight.
pub fn present(
    warning: &VersionWarning,
    periods: DismissalPeriods,
    dismiss_pending: bool,
) -> WarningBanner {
    let dismiss = warning.is_dismissible().then(|| {
        let days = periods
            .for_type(warning.warning_type)
            .unwrap_or(DEFAULT_DISMISSAL_PERIOD_DAYS);
        DismissAffordance {
            warning_type: warning.warning_type,
            label: "Dismiss",
            hint: format!("Dismiss warning for {days} days"),
            enabled: !dismiss_pending,
        }
    });

    WarningBanner {
        title: title_for(warning.warning_type),
        icon: icon_for(warning.warning_type, warning.level),
        status: status_for(warning.level),
        message: warning.message.clone(),
        remaining: remaining_days_text(warning.days_remaining),
        dismiss,
    }
}
