use std::fmt;

use super::records::{ApplicationDraft, Attachment, Document, EducationInfo, Guardian, Olympic};
use super::Step;
use crate::utils::is_blank;

/// Oldest graduation or award year accepted.
const MIN_YEAR: i32 = 1950;

/// GPA scale upper bound.
const MAX_GPA: f64 = 5.0;

/// One missing or invalid field. `index` is the record position within the
/// step, when the step holds a list.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldError {
    pub step: Step,
    pub index: Option<usize>,
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    fn new(step: Step, index: Option<usize>, field: &'static str, message: impl Into<String>) -> Self {
        Self {
            step,
            index,
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(i) => write!(f, "{} #{}: {}", self.step.title(), i + 1, self.message),
            None => write!(f, "{}: {}", self.step.title(), self.message),
        }
    }
}

/// Validate the part of `draft` that `step` edits. Empty when valid.
/// `max_year` is the latest acceptable graduation/award year.
pub fn validate_step(draft: &ApplicationDraft, step: Step, max_year: i32) -> Vec<FieldError> {
    match step {
        Step::Education => validate_education(&draft.education, max_year),
        Step::Guardians => validate_guardians(&draft.guardians),
        Step::Olympics => validate_olympics(&draft.olympics, max_year),
        Step::Documents => validate_documents(&draft.documents),
        Step::Review => Vec::new(),
    }
}

/// Validate every editing step, in wizard order.
pub fn validate_all(draft: &ApplicationDraft, max_year: i32) -> Vec<FieldError> {
    Step::ALL
        .iter()
        .flat_map(|&step| validate_step(draft, step, max_year))
        .collect()
}

fn check_attachment(
    errors: &mut Vec<FieldError>,
    step: Step,
    index: usize,
    field: &'static str,
    label: &str,
    attachment: &Attachment,
) {
    match attachment {
        Attachment::Uploaded(_) => {}
        Attachment::Uploading { .. } => errors.push(FieldError::new(
            step,
            Some(index),
            field,
            format!("{} is still uploading", label),
        )),
        Attachment::Unattached => errors.push(FieldError::new(
            step,
            Some(index),
            field,
            format!("{} must be uploaded", label),
        )),
    }
}

fn check_year(
    errors: &mut Vec<FieldError>,
    step: Step,
    index: usize,
    field: &'static str,
    label: &str,
    year: i32,
    max_year: i32,
) {
    if year == 0 {
        errors.push(FieldError::new(step, Some(index), field, format!("{} is required", label)));
    } else if !(MIN_YEAR..=max_year).contains(&year) {
        errors.push(FieldError::new(
            step,
            Some(index),
            field,
            format!("{} must be between {} and {}", label, MIN_YEAR, max_year),
        ));
    }
}

fn require_text(
    errors: &mut Vec<FieldError>,
    step: Step,
    index: usize,
    field: &'static str,
    label: &str,
    value: &str,
) {
    if is_blank(value) {
        errors.push(FieldError::new(step, Some(index), field, format!("{} is required", label)));
    }
}

fn validate_education(entries: &[EducationInfo], max_year: i32) -> Vec<FieldError> {
    let step = Step::Education;
    if entries.is_empty() {
        return vec![FieldError::new(step, None, "education", "At least one school is required")];
    }

    let mut errors = Vec::new();
    for (i, entry) in entries.iter().enumerate() {
        require_text(&mut errors, step, i, "school_name", "School name", &entry.school_name);

        match entry.school_gpa {
            None => errors.push(FieldError::new(step, Some(i), "school_gpa", "GPA is required")),
            Some(gpa) if !(0.0..=MAX_GPA).contains(&gpa) => errors.push(FieldError::new(
                step,
                Some(i),
                "school_gpa",
                format!("GPA must be between 0 and {}", MAX_GPA),
            )),
            Some(_) => {}
        }

        check_year(&mut errors, step, i, "graduation_year", "Graduation year", entry.graduation_year, max_year);
        check_attachment(&mut errors, step, i, "certificate", "Certificate", &entry.certificate);
    }
    errors
}

fn validate_guardians(guardians: &[Guardian]) -> Vec<FieldError> {
    let step = Step::Guardians;
    if guardians.is_empty() {
        return vec![FieldError::new(step, None, "guardians", "At least one guardian is required")];
    }

    let mut errors = Vec::new();
    for (i, guardian) in guardians.iter().enumerate() {
        require_text(&mut errors, step, i, "full_name", "Full name", &guardian.full_name);
        require_text(&mut errors, step, i, "relation", "Relation", &guardian.relation);
        require_text(&mut errors, step, i, "phone", "Phone", &guardian.phone);
    }
    errors
}

fn validate_olympics(olympics: &[Olympic], max_year: i32) -> Vec<FieldError> {
    let step = Step::Olympics;
    let mut errors = Vec::new();
    for (i, award) in olympics.iter().enumerate() {
        require_text(&mut errors, step, i, "subject", "Subject", &award.subject);
        if award.place == 0 {
            errors.push(FieldError::new(step, Some(i), "place", "Place is required"));
        }
        check_year(&mut errors, step, i, "year", "Year", award.year, max_year);
        check_attachment(&mut errors, step, i, "certificate", "Certificate", &award.certificate);
    }
    errors
}

fn validate_documents(documents: &[Document]) -> Vec<FieldError> {
    let step = Step::Documents;
    if documents.is_empty() {
        return vec![FieldError::new(step, None, "documents", "At least one document is required")];
    }

    let mut errors = Vec::new();
    for (i, document) in documents.iter().enumerate() {
        require_text(&mut errors, step, i, "kind", "Document type", &document.kind);
        check_attachment(&mut errors, step, i, "file", "File", &document.file);
    }
    errors
}
