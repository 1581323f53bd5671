//! Defect reports exported from the issue tracker.

use std::collections::BTreeSet;
use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::FaultlineError;

/// A defect ticket and its attributed release indices.
///
/// The version indices are never read from the tracker export; they are
/// filled in once per generation run after the release timeline is known.
/// `None` means "unknown".
///
/// # Examples
///
/// ```
/// use faultline_core::BugReport;
///
/// let json = r#"{
///     "key": "AVRO-101",
///     "created": "2020-02-03T10:00:00.000+0000",
///     "resolved": "2020-07-01T08:30:00Z",
///     "affectedVersions": ["1.0"]
/// }"#;
/// let ticket: BugReport = serde_json::from_str(json).unwrap();
/// assert_eq!(ticket.key, "AVRO-101");
/// assert!(ticket.resolved.is_some());
/// assert!(ticket.introduction.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BugReport {
    /// Unique tracker key, e.g. `PROJ-123`.
    pub key: String,
    /// When the ticket was filed.
    #[serde(deserialize_with = "tracker_datetime")]
    pub created: DateTime<Utc>,
    /// When the ticket was resolved, if it was.
    #[serde(default, deserialize_with = "optional_tracker_datetime")]
    pub resolved: Option<DateTime<Utc>>,
    /// Tracker-reported affected version names.
    #[serde(default)]
    pub affected_versions: BTreeSet<String>,
    /// Introduction version index (IV).
    #[serde(skip_deserializing)]
    pub introduction: Option<u32>,
    /// Opening version index (OV).
    #[serde(skip_deserializing)]
    pub opening: Option<u32>,
    /// Fixed version index (FV).
    #[serde(skip_deserializing)]
    pub fixed: Option<u32>,
    /// Commit that fixed the defect.
    #[serde(default)]
    pub fix_commit: Option<String>,
}

impl BugReport {
    /// Create a ticket with no affected versions and unknown indices.
    pub fn new(key: impl Into<String>, created: DateTime<Utc>) -> Self {
        Self {
            key: key.into(),
            created,
            resolved: None,
            affected_versions: BTreeSet::new(),
            introduction: None,
            opening: None,
            fixed: None,
            fix_commit: None,
        }
    }

    /// Set all three version indices at once.
    pub fn with_versions(
        mut self,
        introduction: Option<u32>,
        opening: Option<u32>,
        fixed: Option<u32>,
    ) -> Self {
        self.introduction = introduction;
        self.opening = opening;
        self.fixed = fixed;
        self
    }

    /// `(opening, fixed)` when both are known and the fix came in a later
    /// release than the opening.
    pub fn open_fix_window(&self) -> Option<(u32, u32)> {
        match (self.opening, self.fixed) {
            (Some(ov), Some(fv)) if ov > 0 && fv > ov => Some((ov, fv)),
            _ => None,
        }
    }
}

/// Load tickets from a tracker export (a JSON array).
///
/// # Errors
///
/// Returns [`FaultlineError::FileNotFound`] if `path` does not exist, or
/// [`FaultlineError::Serialization`] if the content is not a valid export.
pub fn load_tickets(path: &Path) -> Result<Vec<BugReport>, FaultlineError> {
    if !path.exists() {
        return Err(FaultlineError::FileNotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path)?;
    let tickets: Vec<BugReport> = serde_json::from_str(&content)?;
    Ok(tickets)
}

/// Parse the timestamp shapes trackers emit: RFC 3339, Jira's
/// `2020-02-03T10:00:00.000+0000`, or a bare date (midnight UTC).
pub fn parse_tracker_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn tracker_datetime<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_tracker_datetime(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("unrecognized timestamp: {raw}")))
}

fn optional_tracker_datetime<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => parse_tracker_datetime(&raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("unrecognized timestamp: {raw}"))),
    }
}
