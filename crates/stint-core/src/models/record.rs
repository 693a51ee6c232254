//! Record model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

use crate::error::Error;
use crate::util::duration_millis;

const HOUR: u64 = 60 * 60;
const DAY: u64 = 24 * HOUR;
const WEEK: u64 = 7 * DAY;

/// Opaque record identifier, the join key between replicas.
///
/// Freshly created records get a UUID v7 (time-sortable), but any non-empty
/// string coming back from a replica is accepted as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Create a new unique record ID using UUID v7
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Wrap an existing identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First `len` characters, for compact listings
    #[must_use]
    pub fn short(&self, len: usize) -> String {
        self.0.chars().take(len).collect()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RecordId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput("record id cannot be empty".into()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A tracked activity, the unit of reconciliation.
///
/// All timestamps are Unix milliseconds. `last_modified` is owned by the
/// record service; stores and the reconciler carry it through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Unique identifier
    pub id: RecordId,
    /// Short title
    pub title: String,
    /// Display tags, order preserved
    #[serde(default)]
    pub tags: Vec<String>,
    /// When the activity began
    #[serde(default)]
    pub started_at: Option<i64>,
    /// When the activity finished; `None` while in progress
    #[serde(default)]
    pub ended_at: Option<i64>,
    /// Conflict-resolution timestamp
    pub last_modified: i64,
    /// Informational estimate
    #[serde(default, with = "duration_millis")]
    pub estimated_duration: Duration,
    /// Free text
    #[serde(default)]
    pub body: String,
}

impl Record {
    /// Build a fresh record from a draft, started and stamped at `now`.
    pub(crate) fn from_draft(id: RecordId, draft: RecordDraft, now: i64) -> Self {
        Self {
            id,
            title: draft.title,
            tags: draft.tags,
            started_at: Some(draft.started_at.unwrap_or(now)),
            ended_at: None,
            last_modified: now,
            estimated_duration: draft.estimated_duration,
            body: draft.body,
        }
    }

    /// Whether the activity is still running
    #[must_use]
    pub const fn is_in_progress(&self) -> bool {
        self.ended_at.is_none()
    }

    /// Estimated minus actual duration.
    ///
    /// Negative when the activity overran. `None` until both endpoints are set.
    #[must_use]
    pub fn estimation_bias(&self) -> Option<chrono::Duration> {
        let (started, ended) = (self.started_at?, self.ended_at?);
        let estimated = chrono::Duration::from_std(self.estimated_duration).ok()?;
        Some(estimated - chrono::Duration::milliseconds(ended - started))
    }

    /// Tags joined for display, e.g. `#learning #rust`
    #[must_use]
    pub fn render_tags(&self) -> String {
        self.tags
            .iter()
            .map(|tag| format!("#{tag}"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// User-supplied fields for a new record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordDraft {
    pub title: String,
    pub tags: Vec<String>,
    pub body: String,
    pub estimated_duration: Duration,
    /// Explicit start; defaults to the creation instant
    pub started_at: Option<i64>,
}

impl RecordDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    #[must_use]
    pub const fn with_estimate(mut self, estimate: Duration) -> Self {
        self.estimated_duration = estimate;
        self
    }
}

/// Build an estimate from calendar units.
#[must_use]
pub const fn estimate_from(weeks: u64, days: u64, hours: u64) -> Duration {
    Duration::from_secs(weeks * WEEK + days * DAY + hours * HOUR)
}

/// Normalize user-entered tags: trim, drop empties and a leading `#`,
/// remove duplicates while keeping first-seen order.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut normalized: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.as_ref().trim().trim_start_matches('#').trim();
        if tag.is_empty() || normalized.iter().any(|existing| existing == tag) {
            continue;
        }
        normalized.push(tag.to_string());
    }
    normalized
}
