use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const UI_API_PREFIX: &str = "/version_check/ui";
pub const STATUS_PATH: &str = "/status";
pub const STATUS_QUERY_KEY: &str = "versionStatus";

pub const DEFAULT_DISMISSAL_PERIOD_DAYS: u32 = 7;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum WarningType {
    Eom,
    Eobs,
    Yanked,
    #[serde(other)]
    Unknown,
}

impl WarningType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarningType::Eom => "eom",
            WarningType::Eobs => "eobs",
            WarningType::Yanked => "yanked",
            WarningType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for WarningType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum WarningLevel {
    Warning,
    Critical,
}

/// The warning types the server accepts a dismissal for. Yanked versions
/// cannot be dismissed, so they have no variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DismissibleWarning {
    Eom,
    Eobs,
}

impl DismissibleWarning {
    pub fn path(&self) -> &'static str {
        match self {
            DismissibleWarning::Eom => "/dismiss/eom",
            DismissibleWarning::Eobs => "/dismiss/eobs",
        }
    }

    pub fn warning_type(&self) -> WarningType {
        match self {
            DismissibleWarning::Eom => WarningType::Eom,
            DismissibleWarning::Eobs => WarningType::Eobs,
        }
    }
}

impl TryFrom<WarningType> for DismissibleWarning {
    type Error = WarningType;

    fn try_from(value: WarningType) -> Result<Self, Self::Error> {
        match value {
            WarningType::Eom => Ok(DismissibleWarning::Eom),
            WarningType::Eobs => Ok(DismissibleWarning::Eobs),
            other => Err(other),
        }
    }
}

impl fmt::Display for DismissibleWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.warning_type().fmt(f)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct VersionWarning {
    #[serde(rename = "type")]
    pub warning_type: WarningType,
    pub level: WarningLevel,
    pub message: String,
    #[serde(default)]
    pub days_remaining: Option<i64>,
    #[serde(default, deserialize_with = "timestamp::deserialize_opt")]
    pub dismissed_until: Option<DateTime<Utc>>,
    #[serde(default = "default_can_dismiss")]
    pub can_dismiss: bool,
}

fn default_can_dismiss() -> bool {
    true
}

impl VersionWarning {
    /// Whether a dismiss control may be offered. Yanked and unrecognised
    /// warnings never are, whatever `can_dismiss` says.
    pub fn is_dismissible(&self) -> bool {
        self.can_dismiss && DismissibleWarning::try_from(self.warning_type).is_ok()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct VersionStatus {
    #[serde(default)]
    pub current_version: Option<String>,
    #[serde(default)]
    pub warning: Option<VersionWarning>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StatusResponse {
    pub status: VersionStatus,
    #[serde(default = "default_dismissal_period")]
    pub eom_dismissal_period_days: u32,
    #[serde(default = "default_dismissal_period")]
    pub eobs_dismissal_period_days: u32,
}

fn default_dismissal_period() -> u32 {
    DEFAULT_DISMISSAL_PERIOD_DAYS
}

impl StatusResponse {
    pub fn warning(&self) -> Option<&VersionWarning> {
        self.status.warning.as_ref()
    }

    pub fn dismissal_periods(&self) -> DismissalPeriods {
        DismissalPeriods {
            eom_days: self.eom_dismissal_period_days,
            eobs_days: self.eobs_dismissal_period_days,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DismissalPeriods {
    pub eom_days: u32,
    pub eobs_days: u32,
}

impl DismissalPeriods {
    pub fn for_type(&self, warning_type: WarningType) -> Option<u32> {
        match warning_type {
            WarningType::Eom => Some(self.eom_days),
            WarningType::Eobs => Some(self.eobs_days),
            WarningType::Yanked | WarningType::Unknown => None,
        }
    }
}

impl Default for DismissalPeriods {
    fn default() -> Self {
        Self {
            eom_days: DEFAULT_DISMISSAL_PERIOD_DAYS,
            eobs_days: DEFAULT_DISMISSAL_PERIOD_DAYS,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DismissResult {
    pub success: bool,
    #[serde(default, deserialize_with = "timestamp::deserialize_opt")]
    pub dismissed_until: Option<DateTime<Utc>>,
    pub message: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ErrorResponse {
    pub detail: String,
}

mod timestamp {
    use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, de::Error};

    // The server emits full timestamps, but dates without a time component
    // show up in older payloads and are read as midnight UTC.
    pub fn deserialize_opt<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let Some(raw) = Option::<String>::deserialize(deserializer)? else {
            return Ok(None);
        };
        parse(&raw)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid timestamp: {raw}")))
    }

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Some(parsed.with_timezone(&Utc));
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
            return Some(naive.and_utc());
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    }
}
