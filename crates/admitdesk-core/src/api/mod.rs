//! REST API client module for the admissions backend.
//!
//! This module provides the `ApiClient` for communicating with the
//! admissions API, the `Backend`/`FileUploader`/`ApplicationSubmitter`
//! seams the rest of the crate is written against, and the error taxonomy.
//!
//! The API uses JWT bearer tokens obtained from `auth/login/`.

pub mod backend;
pub mod client;
pub mod error;

pub use backend::{ApplicationSubmitter, Backend, FileUpload, FileUploader};
pub use client::ApiClient;
pub use error::{ApiError, Failure, FailureKind};
