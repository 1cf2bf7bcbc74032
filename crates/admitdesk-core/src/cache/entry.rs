use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::api::Failure;
use crate::models::{
    AdmissionStatistics, ApplicationSummary, ExamSubject, Page, Place, StaffMember,
};

/// Typed payload of a cached resource, one variant per resource.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourcePayload {
    Applications(Page<ApplicationSummary>),
    ExamSubjects(Page<ExamSubject>),
    Statistics(AdmissionStatistics),
    Staff(Page<StaffMember>),
    Places(Page<Place>),
}

impl ResourcePayload {
    pub fn as_applications(&self) -> Option<&Page<ApplicationSummary>> {
        match self {
            ResourcePayload::Applications(page) => Some(page),
            _ => None,
        }
    }

    pub fn as_exam_subjects(&self) -> Option<&Page<ExamSubject>> {
        match self {
            ResourcePayload::ExamSubjects(page) => Some(page),
            _ => None,
        }
    }

    pub fn as_statistics(&self) -> Option<&AdmissionStatistics> {
        match self {
            ResourcePayload::Statistics(stats) => Some(stats),
            _ => None,
        }
    }

    pub fn as_staff(&self) -> Option<&Page<StaffMember>> {
        match self {
            ResourcePayload::Staff(page) => Some(page),
            _ => None,
        }
    }

    pub fn as_places(&self) -> Option<&Page<Place>> {
        match self {
            ResourcePayload::Places(page) => Some(page),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    Pending,
    Success,
    Error,
}

/// Snapshot of one cached query. Replaced whole on every refetch.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub status: QueryStatus,
    pub data: Option<Arc<ResourcePayload>>,
    pub error: Option<Failure>,
    pub fetched_at: DateTime<Utc>,
    /// Set by invalidation; the next fetch goes to the network.
    pub stale: bool,
}

impl CacheEntry {
    pub fn pending() -> Self {
        Self {
            status: QueryStatus::Pending,
            data: None,
            error: None,
            fetched_at: Utc::now(),
            stale: false,
        }
    }

    pub fn success(data: ResourcePayload) -> Self {
        Self {
            status: QueryStatus::Success,
            data: Some(Arc::new(data)),
            error: None,
            fetched_at: Utc::now(),
            stale: false,
        }
    }

    pub fn failure(error: Failure) -> Self {
        Self {
            status: QueryStatus::Error,
            data: None,
            error: Some(error),
            fetched_at: Utc::now(),
            stale: false,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }

    pub fn payload(&self) -> Option<&ResourcePayload> {
        self.data.as_deref()
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.fetched_at).num_minutes()
    }

    /// Only successful, non-invalidated entries within the window are served
    /// without a network call.
    pub fn is_fresh(&self, stale_after: Duration) -> bool {
        self.is_success() && !self.stale && Utc::now() - self.fetched_at <= stale_after
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            if minutes % 60 >= 30 {
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            format!("{}d ago", minutes / 1440)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::FailureKind;
    use crate::models::AdmissionStatistics;

    fn stats_entry() -> CacheEntry {
        CacheEntry::success(ResourcePayload::Statistics(AdmissionStatistics::default()))
    }

    #[test]
    fn test_fresh_success_entry() {
        let entry = stats_entry();
        assert!(entry.is_fresh(Duration::minutes(5)));
        assert!(entry.payload().and_then(|p| p.as_statistics()).is_some());
        assert!(entry.payload().and_then(|p| p.as_applications()).is_none());
    }

    #[test]
    fn test_old_or_invalidated_entry_is_not_fresh() {
        let mut old = stats_entry();
        old.fetched_at = Utc::now() - Duration::minutes(6);
        assert!(!old.is_fresh(Duration::minutes(5)));

        let mut invalidated = stats_entry();
        invalidated.stale = true;
        assert!(!invalidated.is_fresh(Duration::minutes(5)));
    }

    #[test]
    fn test_pending_and_error_entries_are_never_fresh() {
        assert!(!CacheEntry::pending().is_fresh(Duration::minutes(5)));
        let failed = CacheEntry::failure(Failure {
            kind: FailureKind::Server,
            message: "boom".to_string(),
        });
        assert!(!failed.is_fresh(Duration::minutes(5)));
        assert!(failed.data.is_none());
    }

    #[test]
    fn test_age_display() {
        let mut entry = stats_entry();
        assert_eq!(entry.age_display(), "just now");
        entry.fetched_at = Utc::now() - Duration::minutes(90);
        assert_eq!(entry.age_display(), "2h ago");
        entry.fetched_at = Utc::now() - Duration::minutes(3000);
        assert_eq!(entry.age_display(), "2d ago");
    }
}
