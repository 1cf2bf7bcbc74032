//! Data models for admissions resources.
//!
//! - `Page`: the paginated envelope used by every list endpoint
//! - `ApplicationSummary`, `ApplicationStatus`, `ApplicationUpdate`
//! - Reference data: `ExamSubject`, `StaffMember`, `Place`
//! - `AdmissionStatistics` and its per-region breakdowns
//! - `UploadedFile`: server-side file reference

pub mod application;
pub mod catalog;
pub mod page;
pub mod statistics;

pub use application::{
    filter_applications, ApplicationStatus, ApplicationSummary, ApplicationUpdate,
    SubmittedApplication,
};
pub use catalog::{ExamSubject, NewExamSubject, NewStaffMember, Place, StaffMember, UploadedFile};
pub use page::{paginate, total_pages, Page, DEFAULT_PAGE_SIZE};
pub use statistics::{
    AdmissionStatistics, GenderBreakdown, MajorBreakdown, RegionCounts, StatusBreakdown,
};
