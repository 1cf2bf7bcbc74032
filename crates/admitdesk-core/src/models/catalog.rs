//! Reference data managed by admissions staff: exam subjects, staff
//! accounts and per-admission places.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamSubject {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub max_score: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewExamSubject {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_score: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffMember {
    pub id: i64,
    pub full_name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStaffMember {
    pub full_name: String,
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Seats offered for one major within an admission campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Place {
    pub id: i64,
    pub major: String,
    pub quota: u32,
    #[serde(default)]
    pub filled: u32,
}

impl Place {
    pub fn remaining(&self) -> u32 {
        self.quota.saturating_sub(self.filled)
    }
}

/// Reference returned by the upload endpoint for a stored file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub id: i64,
    pub path: String,
}
