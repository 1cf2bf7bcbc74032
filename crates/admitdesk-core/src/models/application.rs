use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::contains_ignore_case;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    New,
    Reviewing,
    Accepted,
    Rejected,
    #[serde(other)]
    Unknown,
}

impl ApplicationStatus {
    pub fn display_name(&self) -> &'static str {
        match self {
            ApplicationStatus::New => "New",
            ApplicationStatus::Reviewing => "Under review",
            ApplicationStatus::Accepted => "Accepted",
            ApplicationStatus::Rejected => "Rejected",
            ApplicationStatus::Unknown => "Unknown",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "new" => Some(ApplicationStatus::New),
            "reviewing" | "review" => Some(ApplicationStatus::Reviewing),
            "accepted" => Some(ApplicationStatus::Accepted),
            "rejected" => Some(ApplicationStatus::Rejected),
            _ => None,
        }
    }
}

/// One row of the applications list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationSummary {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub middle_name: Option<String>,
    #[serde(default)]
    pub phone: String,
    pub status: ApplicationStatus,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub major: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl ApplicationSummary {
    pub fn full_name(&self) -> String {
        match self.middle_name.as_deref() {
            Some(middle) if !middle.is_empty() => {
                format!("{} {} {}", self.last_name, self.first_name, middle)
            }
            _ => format!("{} {}", self.last_name, self.first_name),
        }
    }

    fn matches(&self, query: &str) -> bool {
        contains_ignore_case(&self.first_name, query)
            || contains_ignore_case(&self.last_name, query)
            || self
                .middle_name
                .as_deref()
                .is_some_and(|m| contains_ignore_case(m, query))
            || self.phone.contains(query)
            || self.id.to_string() == query
    }
}

/// Client-side search over an already fetched list.
/// An empty or blank query keeps every row.
pub fn filter_applications<'a>(
    items: &'a [ApplicationSummary],
    query: &str,
) -> Vec<&'a ApplicationSummary> {
    let query = query.trim();
    if query.is_empty() {
        return items.iter().collect();
    }
    items.iter().filter(|a| a.matches(query)).collect()
}

/// Partial update of an application; only set fields are sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicationUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub middle_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

/// Server acknowledgement for a submitted application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedApplication {
    pub id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(id: i64, first: &str, last: &str, phone: &str) -> ApplicationSummary {
        ApplicationSummary {
            id,
            first_name: first.to_string(),
            last_name: last.to_string(),
            middle_name: None,
            phone: phone.to_string(),
            status: ApplicationStatus::New,
            region: "north".to_string(),
            major: None,
            created_at: None,
        }
    }

    #[test]
    fn test_status_unknown_value() {
        let status: ApplicationStatus =
            serde_json::from_str("\"archived\"").expect("unknown maps to Unknown");
        assert_eq!(status, ApplicationStatus::Unknown);
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(ApplicationStatus::parse("Accepted"), Some(ApplicationStatus::Accepted));
        assert_eq!(ApplicationStatus::parse(" review "), Some(ApplicationStatus::Reviewing));
        assert_eq!(ApplicationStatus::parse("nope"), None);
    }

    #[test]
    fn test_filter_applications() {
        let items = vec![
            summary(101, "Aziz", "Karimov", "+998901112233"),
            summary(102, "Malika", "Rustamova", "+998935554433"),
            summary(103, "Bekzod", "Karimov", "+998977778899"),
        ];

        assert_eq!(filter_applications(&items, "").len(), 3);
        assert_eq!(filter_applications(&items, "karim").len(), 2);
        assert_eq!(filter_applications(&items, "5554")[0].id, 102);
        assert_eq!(filter_applications(&items, "103")[0].id, 103);
        assert!(filter_applications(&items, "zzz").is_empty());
    }

    #[test]
    fn test_update_skips_unset_fields() {
        let update = ApplicationUpdate {
            phone: Some("+1".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&update).expect("serializes");
        assert_eq!(json, serde_json::json!({ "phone": "+1" }));
    }
}
