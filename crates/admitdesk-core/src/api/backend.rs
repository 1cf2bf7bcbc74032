//! Seams between the client core and the admissions backend.
//!
//! `ApiClient` implements all of these over HTTP; tests substitute
//! in-memory stubs.

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::cache::{QueryKey, ResourcePayload};
use crate::draft::ApplicationDraft;
use crate::models::{SubmittedApplication, UploadedFile};
use crate::mutation::{Mutation, MutationOutcome};

use super::ApiError;

/// Read and write access to the list/detail resources.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn read(&self, key: &QueryKey) -> Result<ResourcePayload, ApiError>;

    async fn write(&self, mutation: &Mutation) -> Result<MutationOutcome, ApiError>;
}

#[async_trait]
pub trait FileUploader: Send + Sync {
    async fn upload(&self, file: FileUpload) -> Result<UploadedFile, ApiError>;
}

#[async_trait]
pub trait ApplicationSubmitter: Send + Sync {
    async fn submit_application(
        &self,
        draft: &ApplicationDraft,
    ) -> Result<SubmittedApplication, ApiError>;
}

/// A file selected for upload, held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl FileUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read file for upload: {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.bin".to_string());
        Ok(Self { file_name, bytes })
    }

    /// Best-effort MIME type from the file extension.
    pub fn mime_type(&self) -> &'static str {
        let ext = Path::new(&self.file_name)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "pdf" => "application/pdf",
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            _ => "application/octet-stream",
        }
    }
}
