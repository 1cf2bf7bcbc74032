use std::fmt;

use crate::utils::is_blank;

/// Server resources the console reads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Resource {
    Applications,
    ExamSubjects,
    Statistics,
    Staff,
    Places { admission_id: i64 },
}

impl Resource {
    /// Endpoint path relative to the API base URL.
    pub fn path(&self) -> String {
        match self {
            Resource::Applications => "admission/application/".to_string(),
            Resource::ExamSubjects => "admission/subject/".to_string(),
            Resource::Statistics => "admission/statistics/".to_string(),
            Resource::Staff => "admission/staff/".to_string(),
            Resource::Places { admission_id } => {
                format!("admission/admissions/{}/places/", admission_id)
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Resource::Applications => "applications",
            Resource::ExamSubjects => "exam_subjects",
            Resource::Statistics => "statistics",
            Resource::Staff => "staff",
            Resource::Places { .. } => "places",
        }
    }
}

/// Identifies one cached response: resource, page and optional filter.
///
/// Blank filters are normalized away so that `Some("")` and `None`
/// address the same entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey {
    pub resource: Resource,
    pub page: u32,
    pub filter: Option<String>,
}

impl QueryKey {
    pub fn new(resource: Resource) -> Self {
        Self {
            resource,
            page: 1,
            filter: None,
        }
    }

    pub fn page(resource: Resource, page: u32) -> Self {
        Self {
            resource,
            page: page.max(1),
            filter: None,
        }
    }

    pub fn with_filter(mut self, filter: Option<&str>) -> Self {
        self.filter = filter
            .filter(|f| !is_blank(f))
            .map(|f| f.trim().to_string());
        self
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.resource {
            Resource::Places { admission_id } => write!(f, "places/{}", admission_id)?,
            other => write!(f, "{}", other.name())?,
        }
        write!(f, "?page={}", self.page)?;
        if let Some(ref filter) = self.filter {
            write!(f, "&filter={}", filter)?;
        }
        Ok(())
    }
}

/// Matches a family of keys for invalidation: every key of a resource,
/// optionally narrowed to one page. Filters are never part of a prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryPrefix {
    pub resource: Resource,
    pub page: Option<u32>,
}

impl QueryPrefix {
    pub fn all(resource: Resource) -> Self {
        Self {
            resource,
            page: None,
        }
    }

    pub fn page(resource: Resource, page: u32) -> Self {
        Self {
            resource,
            page: Some(page),
        }
    }

    pub fn matches(&self, key: &QueryKey) -> bool {
        self.resource == key.resource && self.page.map_or(true, |p| p == key.page)
    }
}

impl From<Resource> for QueryPrefix {
    fn from(resource: Resource) -> Self {
        Self::all(resource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_filter_normalized() {
        let a = QueryKey::page(Resource::Applications, 2).with_filter(Some("  "));
        let b = QueryKey::page(Resource::Applications, 2);
        assert_eq!(a, b);

        let c = QueryKey::page(Resource::Applications, 2).with_filter(Some(" karimov "));
        assert_eq!(c.filter.as_deref(), Some("karimov"));
    }

    #[test]
    fn test_prefix_matching() {
        let all = QueryPrefix::all(Resource::ExamSubjects);
        assert!(all.matches(&QueryKey::page(Resource::ExamSubjects, 1)));
        assert!(all.matches(&QueryKey::page(Resource::ExamSubjects, 7).with_filter(Some("math"))));
        assert!(!all.matches(&QueryKey::page(Resource::Applications, 1)));

        let second = QueryPrefix::page(Resource::ExamSubjects, 2);
        assert!(second.matches(&QueryKey::page(Resource::ExamSubjects, 2)));
        assert!(!second.matches(&QueryKey::page(Resource::ExamSubjects, 1)));
    }

    #[test]
    fn test_places_are_scoped_per_admission() {
        let prefix = QueryPrefix::all(Resource::Places { admission_id: 4 });
        assert!(prefix.matches(&QueryKey::new(Resource::Places { admission_id: 4 })));
        assert!(!prefix.matches(&QueryKey::new(Resource::Places { admission_id: 5 })));
    }

    #[test]
    fn test_display_and_path() {
        let key = QueryKey::page(Resource::Applications, 3).with_filter(Some("aziz"));
        assert_eq!(key.to_string(), "applications?page=3&filter=aziz");
        assert_eq!(
            Resource::Places { admission_id: 12 }.path(),
            "admission/admissions/12/places/"
        );
    }
}
