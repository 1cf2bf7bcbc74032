//! The applicant-side wizard that accumulates an application across steps
//! and keeps it in durable storage until it is submitted.

mod records;
mod store;
mod validate;
mod wizard;

pub use records::{ApplicationDraft, Attachment, Document, EducationInfo, Guardian, Olympic};
pub use store::{DraftStore, FileDraftStore, MemoryDraftStore, StoreError};
pub use validate::{validate_all, validate_step, FieldError};
pub use wizard::{AttachmentSlot, DraftError, Step, UploadOutcome, Wizard};
