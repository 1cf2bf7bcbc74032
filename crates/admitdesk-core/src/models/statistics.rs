//! Raw dashboard statistics as returned by `admission/statistics/`.
//!
//! Every breakdown carries its region tag so that the dashboard can scope
//! all figures to one region without joining unrelated lists.

use serde::{Deserialize, Serialize};

use super::ApplicationStatus;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdmissionStatistics {
    /// Region tags the backend knows about.
    #[serde(default)]
    pub regions: Vec<String>,
    #[serde(default)]
    pub by_major: Vec<MajorBreakdown>,
    #[serde(default)]
    pub by_gender: Vec<GenderBreakdown>,
    #[serde(default)]
    pub by_status: Vec<StatusBreakdown>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MajorBreakdown {
    pub major: String,
    #[serde(default)]
    pub regions: Vec<RegionCounts>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionCounts {
    pub region: String,
    #[serde(default)]
    pub applications: u64,
    #[serde(default)]
    pub accepted: u64,
    #[serde(default)]
    pub rejected: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenderBreakdown {
    pub region: String,
    #[serde(default)]
    pub male: u64,
    #[serde(default)]
    pub female: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusBreakdown {
    pub region: String,
    pub status: ApplicationStatus,
    #[serde(default)]
    pub count: u64,
}
