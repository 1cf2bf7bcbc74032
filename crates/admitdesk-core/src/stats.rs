//! Dashboard figures derived from `AdmissionStatistics`.
//!
//! Everything here is a pure function of its inputs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::{
    AdmissionStatistics, ApplicationStatus, GenderBreakdown, MajorBreakdown, RegionCounts,
    StatusBreakdown,
};

/// `part` as a percentage of `whole`, rounded to two decimals.
/// A zero `whole` yields exactly `0.0`.
pub fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    let raw = part as f64 / whole as f64 * 100.0;
    (raw * 100.0).round() / 100.0
}

/// Fixed two-decimal rendering, e.g. `"33.33"`.
pub fn format_percentage(value: f64) -> String {
    format!("{:.2}", value)
}

/// Numeric column of a `RegionCounts` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CountField {
    Applications,
    Accepted,
    Rejected,
}

impl CountField {
    pub fn of(&self, counts: &RegionCounts) -> u64 {
        match self {
            CountField::Applications => counts.applications,
            CountField::Accepted => counts.accepted,
            CountField::Rejected => counts.rejected,
        }
    }
}

/// Region selection of the dashboard. `All` is the identity filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RegionFilter {
    #[default]
    All,
    Only(String),
}

impl RegionFilter {
    /// `None` and blank selections mean "All".
    pub fn from_selection(selection: Option<&str>) -> Self {
        match selection.map(str::trim) {
            Some(region) if !region.is_empty() && !region.eq_ignore_ascii_case("all") => {
                RegionFilter::Only(region.to_string())
            }
            _ => RegionFilter::All,
        }
    }

    pub fn matches(&self, region: &str) -> bool {
        match self {
            RegionFilter::All => true,
            RegionFilter::Only(selected) => selected == region,
        }
    }

    /// Keep only the region rows this filter selects, per major.
    pub fn restrict_majors(&self, majors: &[MajorBreakdown]) -> Vec<MajorBreakdown> {
        majors
            .iter()
            .map(|major| MajorBreakdown {
                major: major.major.clone(),
                regions: major
                    .regions
                    .iter()
                    .filter(|counts| self.matches(&counts.region))
                    .cloned()
                    .collect(),
            })
            .collect()
    }

    pub fn restrict_genders<'a>(&self, rows: &'a [GenderBreakdown]) -> Vec<&'a GenderBreakdown> {
        rows.iter().filter(|row| self.matches(&row.region)).collect()
    }

    pub fn restrict_statuses<'a>(&self, rows: &'a [StatusBreakdown]) -> Vec<&'a StatusBreakdown> {
        rows.iter().filter(|row| self.matches(&row.region)).collect()
    }

    pub fn label(&self) -> &str {
        match self {
            RegionFilter::All => "All regions",
            RegionFilter::Only(region) => region,
        }
    }
}

/// Sum `field` over every major, one bucket per known region.
/// Rows tagged with a region outside `known` are ignored.
pub fn region_totals(
    majors: &[MajorBreakdown],
    field: CountField,
    known: &[String],
) -> BTreeMap<String, u64> {
    let mut totals: BTreeMap<String, u64> = known.iter().map(|r| (r.clone(), 0)).collect();
    for counts in majors.iter().flat_map(|m| m.regions.iter()) {
        if let Some(total) = totals.get_mut(&counts.region) {
            *total += field.of(counts);
        }
    }
    totals
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenderSplit {
    pub male: u64,
    pub female: u64,
    pub male_percentage: f64,
    pub female_percentage: f64,
}

impl GenderSplit {
    pub fn from_rows<'a>(rows: impl IntoIterator<Item = &'a GenderBreakdown>) -> Self {
        let (male, female) = rows
            .into_iter()
            .fold((0, 0), |(m, f), row| (m + row.male, f + row.female));
        let total = male + female;
        Self {
            male,
            female,
            male_percentage: percentage(male, total),
            female_percentage: percentage(female, total),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusShare {
    pub status: ApplicationStatus,
    pub count: u64,
    pub percentage: f64,
}

/// Everything the statistics dashboard shows for one region selection.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSummary {
    pub filter: RegionFilter,
    pub applications_by_region: BTreeMap<String, u64>,
    pub total_applications: u64,
    pub total_accepted: u64,
    pub total_rejected: u64,
    pub acceptance_rate: f64,
    pub gender: GenderSplit,
    pub statuses: Vec<StatusShare>,
}

impl DashboardSummary {
    pub fn build(stats: &AdmissionStatistics, filter: &RegionFilter) -> Self {
        let majors = filter.restrict_majors(&stats.by_major);

        let applications_by_region =
            region_totals(&majors, CountField::Applications, &stats.regions);
        let total_applications = applications_by_region.values().sum();
        let total_accepted = region_totals(&majors, CountField::Accepted, &stats.regions)
            .values()
            .sum();
        let total_rejected = region_totals(&majors, CountField::Rejected, &stats.regions)
            .values()
            .sum();

        let gender = GenderSplit::from_rows(filter.restrict_genders(&stats.by_gender));

        let mut by_status: BTreeMap<ApplicationStatus, u64> = BTreeMap::new();
        for row in filter.restrict_statuses(&stats.by_status) {
            *by_status.entry(row.status).or_default() += row.count;
        }
        let status_total: u64 = by_status.values().sum();
        let statuses = by_status
            .into_iter()
            .map(|(status, count)| StatusShare {
                status,
                count,
                percentage: percentage(count, status_total),
            })
            .collect();

        Self {
            filter: filter.clone(),
            applications_by_region,
            total_applications,
            total_accepted,
            total_rejected,
            acceptance_rate: percentage(total_accepted, total_applications),
            gender,
            statuses,
        }
    }
}
