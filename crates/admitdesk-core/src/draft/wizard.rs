use std::collections::BTreeSet;
use std::fmt;

use chrono::{Datelike, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::records::{records_from_value, ApplicationDraft, Attachment};
use super::store::{DraftStore, StoreError};
use super::validate::{validate_all, validate_step, FieldError};
use crate::api::{ApiError, ApplicationSubmitter, Failure, FileUpload, FileUploader};
use crate::models::{SubmittedApplication, UploadedFile};

/// Wizard pages, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Step {
    Education,
    Guardians,
    Olympics,
    Documents,
    Review,
}

impl Step {
    /// Steps that edit part of the draft.
    pub const ALL: [Step; 4] = [Step::Education, Step::Guardians, Step::Olympics, Step::Documents];

    pub fn next(&self) -> Option<Step> {
        match self {
            Step::Education => Some(Step::Guardians),
            Step::Guardians => Some(Step::Olympics),
            Step::Olympics => Some(Step::Documents),
            Step::Documents => Some(Step::Review),
            Step::Review => None,
        }
    }

    pub fn prev(&self) -> Option<Step> {
        match self {
            Step::Education => None,
            Step::Guardians => Some(Step::Education),
            Step::Olympics => Some(Step::Guardians),
            Step::Documents => Some(Step::Olympics),
            Step::Review => Some(Step::Documents),
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Step::Education => "Education",
            Step::Guardians => "Guardians",
            Step::Olympics => "Olympiads",
            Step::Documents => "Documents",
            Step::Review => "Review",
        }
    }

    /// Key of the step's section in the draft store. Review stores nothing.
    pub fn storage_key(&self) -> Option<&'static str> {
        match self {
            Step::Education => Some("educationInformation"),
            Step::Guardians => Some("guardians"),
            Step::Olympics => Some("olympics"),
            Step::Documents => Some("documents"),
            Step::Review => None,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// A record's attachment, addressed by record position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentSlot {
    Education(usize),
    Olympic(usize),
    Document(usize),
}

/// What happened to an upload result.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    Attached,
    /// The attachment went back to unattached.
    Failed(Failure),
    /// The slot moved on while the upload ran; nothing changed.
    Discarded,
}

#[derive(Error, Debug)]
pub enum DraftError {
    #[error("{} field(s) need attention", .0.len())]
    Invalid(Vec<FieldError>),

    #[error("{0} is locked until the earlier steps are completed")]
    StepLocked(Step),

    #[error("Already at the last step")]
    NoNextStep,

    #[error("Applications can only be submitted from the review step")]
    NotAtReview,

    #[error("No record for attachment {0:?}")]
    NoSuchSlot(AttachmentSlot),

    #[error("Submission failed: {}", .0.kind.user_message())]
    Submit(Failure),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl DraftError {
    /// Field errors of a failed validation, empty for other errors.
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            DraftError::Invalid(errors) => errors,
            _ => &[],
        }
    }
}

/// Multi-step application form that survives restarts through a `DraftStore`.
pub struct Wizard<S: DraftStore> {
    store: S,
    draft: ApplicationDraft,
    step: Step,
    /// Steps that passed validation at least once.
    validated: BTreeSet<Step>,
    next_ticket: u64,
    max_year: i32,
}

impl<S: DraftStore> Wizard<S> {
    /// Load whatever the store holds and continue where the applicant left off.
    pub fn resume(store: S) -> Result<Self, DraftError> {
        let max_year = Utc::now().year() + 1;
        let mut draft = ApplicationDraft::default();
        let mut stored = BTreeSet::new();

        for step in Step::ALL {
            let Some(key) = step.storage_key() else { continue };
            let Some(raw) = store.load(key)? else { continue };
            stored.insert(step);
            match step {
                Step::Education => draft.education = parse_section(key, &raw),
                Step::Guardians => draft.guardians = parse_section(key, &raw),
                Step::Olympics => draft.olympics = parse_section(key, &raw),
                Step::Documents => draft.documents = parse_section(key, &raw),
                Step::Review => {}
            }
        }

        let mut validated = BTreeSet::new();
        for step in Step::ALL {
            if stored.contains(&step) && validate_step(&draft, step, max_year).is_empty() {
                validated.insert(step);
            } else {
                break;
            }
        }
        let step = Step::ALL
            .into_iter()
            .find(|s| !validated.contains(s))
            .unwrap_or(Step::Review);

        debug!(step = %step, validated = validated.len(), "Resumed application draft");
        Ok(Self {
            store,
            draft,
            step,
            validated,
            next_ticket: 0,
            max_year,
        })
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn draft(&self) -> &ApplicationDraft {
        &self.draft
    }

    /// Edit the draft in place. Changes reach the store on the next `next()`,
    /// `go_to()` or `persist()`; `back()` keeps them in memory only.
    pub fn draft_mut(&mut self) -> &mut ApplicationDraft {
        &mut self.draft
    }

    pub fn is_validated(&self, step: Step) -> bool {
        self.validated.contains(&step)
    }

    pub fn max_year(&self) -> i32 {
        self.max_year
    }

    /// Validate the current step, persist the draft, then move forward.
    pub fn next(&mut self) -> Result<Step, DraftError> {
        let next = self.step.next().ok_or(DraftError::NoNextStep)?;
        let errors = validate_step(&self.draft, self.step, self.max_year);
        if !errors.is_empty() {
            debug!(step = %self.step, errors = errors.len(), "Step failed validation");
            return Err(DraftError::Invalid(errors));
        }

        self.persist()?;
        self.validated.insert(self.step);
        self.move_to(next);
        Ok(next)
    }

    pub fn back(&mut self) -> Option<Step> {
        let prev = self.step.prev()?;
        self.move_to(prev);
        Some(prev)
    }

    /// Jump to `target`. Forward jumps need every earlier step validated,
    /// and check the current step the way `next()` does before persisting.
    /// Backward jumps persist the current edits without checking them.
    pub fn go_to(&mut self, target: Step) -> Result<Step, DraftError> {
        if target == self.step {
            return Ok(target);
        }
        if target > self.step {
            let unlocked = Step::ALL
                .iter()
                .filter(|s| **s < target && **s != self.step)
                .all(|s| self.validated.contains(s));
            if !unlocked {
                return Err(DraftError::StepLocked(target));
            }
            let errors = validate_step(&self.draft, self.step, self.max_year);
            if !errors.is_empty() {
                self.validated.remove(&self.step);
                return Err(DraftError::Invalid(errors));
            }
            self.validated.insert(self.step);
        }

        self.persist()?;
        self.move_to(target);
        Ok(target)
    }

    /// Write every section under its key, replacing what was stored.
    pub fn persist(&self) -> Result<(), DraftError> {
        self.save_section(Step::Education, &self.draft.education)?;
        self.save_section(Step::Guardians, &self.draft.guardians)?;
        self.save_section(Step::Olympics, &self.draft.olympics)?;
        self.save_section(Step::Documents, &self.draft.documents)?;
        Ok(())
    }

    /// Mark `slot` as uploading and return the ticket its result must carry.
    pub fn begin_upload(&mut self, slot: AttachmentSlot, file_name: &str) -> Result<u64, DraftError> {
        let ticket = self.next_ticket + 1;
        let attachment = self
            .attachment_mut(slot)
            .ok_or(DraftError::NoSuchSlot(slot))?;
        *attachment = Attachment::Uploading {
            file_name: file_name.to_string(),
            ticket,
        };
        self.next_ticket = ticket;
        Ok(ticket)
    }

    /// Apply an upload result if `slot` is still waiting for `ticket`.
    pub fn finish_upload(
        &mut self,
        slot: AttachmentSlot,
        ticket: u64,
        result: Result<UploadedFile, ApiError>,
    ) -> UploadOutcome {
        let Some(attachment) = self.attachment_mut(slot) else {
            debug!(?slot, ticket, "Upload finished for a removed record");
            return UploadOutcome::Discarded;
        };
        match &*attachment {
            Attachment::Uploading { ticket: current, .. } if *current == ticket => {}
            _ => {
                debug!(?slot, ticket, "Discarding stale upload result");
                return UploadOutcome::Discarded;
            }
        }

        match result {
            Ok(file) => {
                debug!(?slot, file_id = file.id, "Attachment uploaded");
                *attachment = Attachment::Uploaded(file);
                UploadOutcome::Attached
            }
            Err(e) => {
                warn!(?slot, error = %e, "Upload failed");
                *attachment = Attachment::Unattached;
                UploadOutcome::Failed(e.to_failure())
            }
        }
    }

    /// Upload `file` and attach it to `slot`.
    pub async fn attach(
        &mut self,
        uploader: &dyn FileUploader,
        slot: AttachmentSlot,
        file: FileUpload,
    ) -> Result<UploadOutcome, DraftError> {
        let ticket = self.begin_upload(slot, &file.file_name)?;
        let result = uploader.upload(file).await;
        Ok(self.finish_upload(slot, ticket, result))
    }

    /// Send the whole draft. Only allowed from the review step.
    pub async fn submit(
        &mut self,
        submitter: &dyn ApplicationSubmitter,
    ) -> Result<SubmittedApplication, DraftError> {
        if self.step != Step::Review {
            return Err(DraftError::NotAtReview);
        }
        let errors = validate_all(&self.draft, self.max_year);
        if !errors.is_empty() {
            return Err(DraftError::Invalid(errors));
        }

        match submitter.submit_application(&self.draft).await {
            Ok(receipt) => {
                info!(application_id = receipt.id, "Application submitted");
                // Memory is cleared even when the store cleanup below fails
                self.reset();
                if let Err(e) = self.remove_stored() {
                    warn!(application_id = receipt.id, error = %e, "Stored draft could not be removed after submit");
                }
                Ok(receipt)
            }
            Err(e) => {
                warn!(error = %e, "Application submission failed, draft kept");
                Err(DraftError::Submit(e.to_failure()))
            }
        }
    }

    /// Drop the draft from memory and from the store.
    pub fn abandon(&mut self) -> Result<(), DraftError> {
        self.reset();
        self.remove_stored()?;
        Ok(())
    }

    fn reset(&mut self) {
        self.draft = ApplicationDraft::default();
        self.validated.clear();
        self.step = Step::Education;
    }

    fn remove_stored(&self) -> Result<(), StoreError> {
        for step in Step::ALL {
            if let Some(key) = step.storage_key() {
                self.store.remove(key)?;
            }
        }
        Ok(())
    }

    fn move_to(&mut self, step: Step) {
        if step != self.step {
            self.cancel_uploads();
            self.step = step;
        }
    }

    /// Uploads still running belong to the page being left; their results
    /// will find no matching ticket.
    fn cancel_uploads(&mut self) {
        let attachments = self
            .draft
            .education
            .iter_mut()
            .map(|e| &mut e.certificate)
            .chain(self.draft.olympics.iter_mut().map(|o| &mut o.certificate))
            .chain(self.draft.documents.iter_mut().map(|d| &mut d.file));
        for attachment in attachments {
            if attachment.is_uploading() {
                *attachment = Attachment::Unattached;
            }
        }
    }

    fn attachment_mut(&mut self, slot: AttachmentSlot) -> Option<&mut Attachment> {
        match slot {
            AttachmentSlot::Education(i) => self.draft.education.get_mut(i).map(|e| &mut e.certificate),
            AttachmentSlot::Olympic(i) => self.draft.olympics.get_mut(i).map(|o| &mut o.certificate),
            AttachmentSlot::Document(i) => self.draft.documents.get_mut(i).map(|d| &mut d.file),
        }
    }

    fn save_section<T: Serialize>(&self, step: Step, records: &[T]) -> Result<(), DraftError> {
        let Some(key) = step.storage_key() else { return Ok(()) };
        let json = serde_json::to_string(records).map_err(|source| StoreError::Serialize {
            key: key.to_string(),
            source,
        })?;
        self.store.save(key, &json)?;
        Ok(())
    }
}

fn parse_section<T: DeserializeOwned>(key: &str, raw: &str) -> Vec<T> {
    match serde_json::from_str(raw) {
        Ok(value) => records_from_value(value),
        Err(e) => {
            warn!(key = key, error = %e, "Stored draft section is unreadable, starting it empty");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::api::FailureKind;
    use crate::draft::{Document, EducationInfo, Guardian, MemoryDraftStore};

    fn file(id: i64) -> UploadedFile {
        UploadedFile {
            id,
            path: format!("/media/admission/{}.pdf", id),
        }
    }

    fn school(name: &str, gpa: Option<f64>, id: i64) -> EducationInfo {
        EducationInfo {
            school_name: name.to_string(),
            school_gpa: gpa,
            graduation_year: 2022,
            certificate: Attachment::Uploaded(file(id)),
        }
    }

    fn guardian() -> Guardian {
        Guardian {
            full_name: "Malika Yusupova".to_string(),
            relation: "mother".to_string(),
            phone: "+998901112233".to_string(),
        }
    }

    fn document(id: i64) -> Document {
        Document {
            kind: "passport".to_string(),
            file: Attachment::Uploaded(file(id)),
        }
    }

    /// Fill and advance through every editing step.
    fn complete(wizard: &mut Wizard<MemoryDraftStore>) {
        wizard.draft_mut().education = vec![school("Lyceum No. 1", Some(4.6), 1)];
        wizard.next().expect("education");
        wizard.draft_mut().guardians = vec![guardian()];
        wizard.next().expect("guardians");
        wizard.next().expect("olympics");
        wizard.draft_mut().documents = vec![document(2)];
        wizard.next().expect("documents");
        assert_eq!(wizard.step(), Step::Review);
    }

    struct StubUploader {
        fail: bool,
    }

    #[async_trait]
    impl FileUploader for StubUploader {
        async fn upload(&self, upload: FileUpload) -> Result<UploadedFile, ApiError> {
            if self.fail {
                return Err(ApiError::ServerError("500 - disk full".to_string()));
            }
            Ok(UploadedFile {
                id: 42,
                path: format!("/media/admission/{}", upload.file_name),
            })
        }
    }

    struct StubSubmitter {
        fail: bool,
        calls: AtomicUsize,
    }

    impl StubSubmitter {
        fn new(fail: bool) -> Self {
            Self {
                fail,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ApplicationSubmitter for StubSubmitter {
        async fn submit_application(
            &self,
            _draft: &ApplicationDraft,
        ) -> Result<SubmittedApplication, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ApiError::ServerError("502 - bad gateway".to_string()));
            }
            Ok(SubmittedApplication { id: 77 })
        }
    }

    #[test]
    fn test_fresh_wizard_starts_empty() {
        let wizard = Wizard::resume(MemoryDraftStore::new()).expect("resume");
        assert_eq!(wizard.step(), Step::Education);
        assert!(wizard.draft().is_empty());
        assert!(!wizard.is_validated(Step::Education));
    }

    #[test]
    fn test_missing_gpa_blocks_education_step() {
        let store = MemoryDraftStore::new();
        let mut wizard = Wizard::resume(store.clone()).expect("resume");
        wizard.draft_mut().education = vec![
            school("School No. 12", Some(4.1), 1),
            school("Academic Lyceum", None, 2),
            school("Presidential School", Some(4.9), 3),
        ];

        let err = wizard.next().expect_err("blocked");
        let errors = err.field_errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].index, Some(1));
        assert_eq!(errors[0].field, "school_gpa");
        assert_eq!(wizard.step(), Step::Education);
        assert!(store.is_empty());
    }

    #[test]
    fn test_valid_step_persists_then_advances() {
        let store = MemoryDraftStore::new();
        let mut wizard = Wizard::resume(store.clone()).expect("resume");
        let schools = vec![
            school("School No. 12", Some(4.1), 1),
            school("Academic Lyceum", Some(3.7), 2),
            school("Presidential School", Some(4.9), 3),
        ];
        wizard.draft_mut().education = schools.clone();

        assert_eq!(wizard.next().expect("advance"), Step::Guardians);
        assert!(wizard.is_validated(Step::Education));

        let raw = store
            .load("educationInformation")
            .expect("load")
            .expect("stored");
        let restored: Vec<EducationInfo> = serde_json::from_str(&raw).expect("parse");
        assert_eq!(restored, schools);
        assert_eq!(store.load("guardians").expect("load").as_deref(), Some("[]"));
    }

    #[test]
    fn test_resume_continues_at_first_unvalidated_step() {
        let store = MemoryDraftStore::new();
        {
            let mut wizard = Wizard::resume(store.clone()).expect("resume");
            wizard.draft_mut().education = vec![school("Lyceum", Some(4.0), 1)];
            wizard.next().expect("education");
            wizard.draft_mut().guardians = vec![guardian()];
            wizard.next().expect("guardians");
        }

        let wizard = Wizard::resume(store).expect("resume again");
        assert_eq!(wizard.draft().education.len(), 1);
        assert_eq!(wizard.draft().guardians[0].full_name, "Malika Yusupova");
        assert!(wizard.is_validated(Step::Guardians));
        // The empty olympics list was persisted as well, and is valid
        assert!(wizard.is_validated(Step::Olympics));
        assert_eq!(wizard.step(), Step::Documents);
    }

    #[test]
    fn test_resume_tolerates_malformed_sections() {
        let store = MemoryDraftStore::new();
        store
            .save(
                "educationInformation",
                r#"[{"school_name": "Lyceum", "school_gpa": "n/a", "graduation_year": 2021}]"#,
            )
            .expect("save");
        store.save("guardians", "{not json").expect("save");

        let wizard = Wizard::resume(store).expect("resume");
        let education = &wizard.draft().education[0];
        assert_eq!(education.school_name, "Lyceum");
        assert_eq!(education.school_gpa, None);
        assert_eq!(education.certificate, Attachment::Unattached);
        assert!(wizard.draft().guardians.is_empty());
        assert_eq!(wizard.step(), Step::Education);
    }

    #[test]
    fn test_go_to_forward_needs_validated_steps() {
        let mut wizard = Wizard::resume(MemoryDraftStore::new()).expect("resume");
        assert!(matches!(
            wizard.go_to(Step::Documents),
            Err(DraftError::StepLocked(Step::Documents))
        ));

        wizard.draft_mut().education = vec![school("Lyceum", Some(4.0), 1)];
        wizard.next().expect("education");
        wizard.draft_mut().guardians = vec![guardian()];
        wizard.next().expect("guardians");

        assert_eq!(wizard.go_to(Step::Education).expect("back"), Step::Education);
        assert_eq!(wizard.go_to(Step::Olympics).expect("forward"), Step::Olympics);
        assert!(wizard.go_to(Step::Review).is_err());
        assert_eq!(wizard.back(), Some(Step::Guardians));
    }

    #[test]
    fn test_go_to_forward_checks_and_persists_current_edits() {
        let store = MemoryDraftStore::new();
        let mut wizard = Wizard::resume(store.clone()).expect("resume");
        wizard.draft_mut().education = vec![school("Lyceum", Some(4.0), 1)];
        wizard.next().expect("education");
        wizard.draft_mut().guardians = vec![guardian()];
        wizard.next().expect("guardians");
        wizard.go_to(Step::Education).expect("back");

        // A broken edit blocks the jump and unmarks the step
        wizard.draft_mut().education[0].school_gpa = None;
        let err = wizard.go_to(Step::Olympics).expect_err("invalid");
        assert_eq!(err.field_errors()[0].field, "school_gpa");
        assert_eq!(wizard.step(), Step::Education);
        assert!(!wizard.is_validated(Step::Education));

        wizard.draft_mut().education[0].school_gpa = Some(4.8);
        wizard.draft_mut().education[0].school_name = "Presidential School".to_string();
        assert_eq!(wizard.go_to(Step::Olympics).expect("forward"), Step::Olympics);

        let resumed = Wizard::resume(store).expect("resume again");
        assert_eq!(resumed.draft().education[0].school_name, "Presidential School");
        assert_eq!(resumed.draft().education[0].school_gpa, Some(4.8));
    }

    #[test]
    fn test_next_at_review_is_an_error() {
        let mut wizard = Wizard::resume(MemoryDraftStore::new()).expect("resume");
        complete(&mut wizard);
        assert!(matches!(wizard.next(), Err(DraftError::NoNextStep)));
    }

    #[tokio::test]
    async fn test_attach_uploads_into_slot() {
        let mut wizard = Wizard::resume(MemoryDraftStore::new()).expect("resume");
        wizard.draft_mut().education = vec![EducationInfo::default()];

        let outcome = wizard
            .attach(
                &StubUploader { fail: false },
                AttachmentSlot::Education(0),
                FileUpload::new("diploma.pdf", b"%PDF".to_vec()),
            )
            .await
            .expect("slot exists");

        assert_eq!(outcome, UploadOutcome::Attached);
        assert_eq!(
            wizard.draft().education[0].certificate.uploaded().map(|f| f.id),
            Some(42)
        );
    }

    #[tokio::test]
    async fn test_failed_upload_reverts_only_that_attachment() {
        let mut wizard = Wizard::resume(MemoryDraftStore::new()).expect("resume");
        wizard.draft_mut().documents = vec![document(5), Document::default()];

        let outcome = wizard
            .attach(
                &StubUploader { fail: true },
                AttachmentSlot::Document(1),
                FileUpload::new("photo.jpg", vec![0xFF, 0xD8]),
            )
            .await
            .expect("slot exists");

        match outcome {
            UploadOutcome::Failed(failure) => assert_eq!(failure.kind, FailureKind::Server),
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(wizard.draft().documents[1].file, Attachment::Unattached);
        assert!(wizard.draft().documents[0].file.uploaded().is_some());
    }

    #[test]
    fn test_stale_upload_result_is_discarded() {
        let mut wizard = Wizard::resume(MemoryDraftStore::new()).expect("resume");
        wizard.draft_mut().education = vec![EducationInfo::default()];

        let first = wizard
            .begin_upload(AttachmentSlot::Education(0), "old.pdf")
            .expect("slot");
        let second = wizard
            .begin_upload(AttachmentSlot::Education(0), "new.pdf")
            .expect("slot");

        assert_eq!(
            wizard.finish_upload(AttachmentSlot::Education(0), first, Ok(file(1))),
            UploadOutcome::Discarded
        );
        assert!(wizard.draft().education[0].certificate.is_uploading());

        assert_eq!(
            wizard.finish_upload(AttachmentSlot::Education(0), second, Ok(file(2))),
            UploadOutcome::Attached
        );
        assert_eq!(
            wizard.draft().education[0].certificate.uploaded().map(|f| f.id),
            Some(2)
        );
    }

    #[test]
    fn test_upload_for_removed_record_is_discarded() {
        let mut wizard = Wizard::resume(MemoryDraftStore::new()).expect("resume");
        wizard.draft_mut().documents = vec![Document::default()];
        let ticket = wizard
            .begin_upload(AttachmentSlot::Document(0), "scan.pdf")
            .expect("slot");
        wizard.draft_mut().documents.clear();

        assert_eq!(
            wizard.finish_upload(AttachmentSlot::Document(0), ticket, Ok(file(9))),
            UploadOutcome::Discarded
        );
        assert!(matches!(
            wizard.begin_upload(AttachmentSlot::Document(0), "scan.pdf"),
            Err(DraftError::NoSuchSlot(_))
        ));
    }

    #[test]
    fn test_leaving_a_step_cancels_its_uploads() {
        let mut wizard = Wizard::resume(MemoryDraftStore::new()).expect("resume");
        wizard.draft_mut().education = vec![school("Lyceum", Some(4.0), 1)];
        wizard.next().expect("education");
        wizard.draft_mut().education.push(EducationInfo::default());
        let ticket = wizard
            .begin_upload(AttachmentSlot::Education(1), "late.pdf")
            .expect("slot");

        wizard.back();
        assert_eq!(wizard.draft().education[1].certificate, Attachment::Unattached);
        assert_eq!(
            wizard.finish_upload(AttachmentSlot::Education(1), ticket, Ok(file(3))),
            UploadOutcome::Discarded
        );
    }

    #[tokio::test]
    async fn test_submit_only_from_review() {
        let mut wizard = Wizard::resume(MemoryDraftStore::new()).expect("resume");
        let submitter = StubSubmitter::new(false);
        assert!(matches!(
            wizard.submit(&submitter).await,
            Err(DraftError::NotAtReview)
        ));
        assert_eq!(submitter.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_submit_success_clears_draft_and_store() {
        let store = MemoryDraftStore::new();
        let mut wizard = Wizard::resume(store.clone()).expect("resume");
        complete(&mut wizard);
        assert!(!store.is_empty());

        let submitter = StubSubmitter::new(false);
        let receipt = wizard.submit(&submitter).await.expect("submitted");
        assert_eq!(receipt.id, 77);
        assert!(store.is_empty());
        assert!(wizard.draft().is_empty());
        assert_eq!(wizard.step(), Step::Education);
    }

    /// Delegates to a memory store but refuses every removal.
    struct UnremovableStore(MemoryDraftStore);

    impl DraftStore for UnremovableStore {
        fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
            self.0.load(key)
        }

        fn save(&self, key: &str, value: &str) -> Result<(), StoreError> {
            self.0.save(key, value)
        }

        fn remove(&self, key: &str) -> Result<(), StoreError> {
            Err(StoreError::Io {
                key: key.to_string(),
                source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            })
        }
    }

    #[tokio::test]
    async fn test_submit_success_survives_store_cleanup_failure() {
        let mut wizard = Wizard::resume(UnremovableStore(MemoryDraftStore::new())).expect("resume");
        wizard.draft_mut().education = vec![school("Lyceum No. 1", Some(4.6), 1)];
        wizard.next().expect("education");
        wizard.draft_mut().guardians = vec![guardian()];
        wizard.next().expect("guardians");
        wizard.next().expect("olympics");
        wizard.draft_mut().documents = vec![document(2)];
        wizard.next().expect("documents");

        let submitter = StubSubmitter::new(false);
        let receipt = wizard.submit(&submitter).await.expect("receipt kept");
        assert_eq!(receipt.id, 77);
        assert!(wizard.draft().is_empty());
        assert_eq!(wizard.step(), Step::Education);
        assert!(!wizard.is_validated(Step::Education));
    }

    #[tokio::test]
    async fn test_submit_failure_keeps_draft_and_store() {
        let store = MemoryDraftStore::new();
        let mut wizard = Wizard::resume(store.clone()).expect("resume");
        complete(&mut wizard);

        let submitter = StubSubmitter::new(true);
        match wizard.submit(&submitter).await {
            Err(DraftError::Submit(failure)) => assert_eq!(failure.kind, FailureKind::Server),
            other => panic!("expected submit failure, got {:?}", other),
        }
        assert_eq!(submitter.calls.load(Ordering::SeqCst), 1);
        assert!(!store.is_empty());
        assert_eq!(wizard.draft().guardians.len(), 1);
        assert_eq!(wizard.step(), Step::Review);
    }

    #[tokio::test]
    async fn test_submit_revalidates_edits_made_at_review() {
        let mut wizard = Wizard::resume(MemoryDraftStore::new()).expect("resume");
        complete(&mut wizard);
        wizard.draft_mut().guardians[0].phone.clear();

        let submitter = StubSubmitter::new(false);
        let err = wizard.submit(&submitter).await.expect_err("invalid");
        assert_eq!(err.field_errors()[0].step, Step::Guardians);
        assert_eq!(submitter.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_abandon_clears_everything() {
        let store = MemoryDraftStore::new();
        let mut wizard = Wizard::resume(store.clone()).expect("resume");
        wizard.draft_mut().education = vec![school("Lyceum", Some(4.0), 1)];
        wizard.next().expect("education");

        wizard.abandon().expect("abandon");
        assert!(store.is_empty());
        assert!(wizard.draft().is_empty());
        assert!(!wizard.is_validated(Step::Education));
    }
}
