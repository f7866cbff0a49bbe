use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A blocked application - an opaque, platform-assigned package identifier.
///
/// Set semantics: uniqueness by package name, insertion order irrelevant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockedApp {
    pub package: String,
}

impl BlockedApp {
    #[must_use]
    pub fn new(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
        }
    }
}

/// One monitoring session: when it ran and how often a blocked app was
/// brought to the foreground while it was active.
///
/// `end_time` is `None` while the session is ongoing. Rows are immutable
/// once the session has been finalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionHistory {
    pub id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub blocked_attempts: u32,
}

impl SessionHistory {
    #[must_use]
    pub fn duration_seconds(&self) -> Option<i64> {
        self.end_time
            .map(|end| end.signed_duration_since(self.start_time).num_seconds())
    }
}
