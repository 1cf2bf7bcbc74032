//! API client for communicating with the admissions REST API.
//!
//! This module provides the `ApiClient` struct for making authenticated
//! API requests and implements the `Backend`, `FileUploader` and
//! `ApplicationSubmitter` seams on top of it.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{header, Client, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::auth::SessionTokens;
use crate::cache::{QueryKey, Resource, ResourcePayload};
use crate::draft::ApplicationDraft;
use crate::models::{
    AdmissionStatistics, ApplicationStatus, ApplicationSummary, ApplicationUpdate, ExamSubject,
    NewExamSubject, NewStaffMember, Page, Place, StaffMember, SubmittedApplication, UploadedFile,
};
use crate::mutation::{Mutation, MutationOutcome};

use super::{ApiError, ApplicationSubmitter, Backend, FileUpload, FileUploader};

// ============================================================================
// Constants
// ============================================================================

const LOGIN_PATH: &str = "auth/login/";
const TOKEN_REFRESH_PATH: &str = "auth/token/refresh/";
const APPLICATIONS_PATH: &str = "admission/application/";
const SUBJECTS_PATH: &str = "admission/subject/";
const STATISTICS_PATH: &str = "admission/statistics/";
const STAFF_PATH: &str = "admission/staff/";
const UPLOAD_PATH: &str = "admission/file/";

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    access: String,
    refresh: String,
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access: String,
}

#[derive(Debug, Serialize)]
struct StatusChange {
    status: ApplicationStatus,
}

/// API client for the admissions backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self::from_client(client, base_url))
    }

    fn from_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        }
    }

    /// Set the bearer token for authenticated requests
    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    /// Create a new ApiClient with the given token, sharing the connection pool.
    pub fn with_token(&self, token: String) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            token: Some(token),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Exchange credentials for an access/refresh token pair
    pub async fn login(&self, username: &str, password: &str) -> Result<SessionTokens, ApiError> {
        let url = self.url(LOGIN_PATH);
        let body = LoginRequest { username, password };
        let response = self.client.post(&url).json(&body).send().await?;
        let response = Self::check_response(response).await?;
        let tokens: LoginResponse = Self::parse_json(response, &url).await?;

        Ok(SessionTokens {
            access: tokens.access,
            refresh: tokens.refresh,
            username: username.to_string(),
            created_at: Utc::now(),
            refreshed_at: Utc::now(),
        })
    }

    /// Obtain a new access token from a refresh token
    pub async fn refresh_access(&self, refresh: &str) -> Result<String, ApiError> {
        let url = self.url(TOKEN_REFRESH_PATH);
        let response = self
            .client
            .post(&url)
            .json(&RefreshRequest { refresh })
            .send()
            .await?;
        let response = Self::check_response(response).await?;
        let refreshed: RefreshResponse = Self::parse_json(response, &url).await?;
        Ok(refreshed.access)
    }

    fn auth_headers(&self) -> Result<header::HeaderMap, ApiError> {
        let mut headers = header::HeaderMap::new();
        if let Some(ref token) = self.token {
            let value = header::HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| ApiError::InvalidRequest(format!("bad token header: {}", e)))?;
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(
        response: reqwest::Response,
    ) -> Result<Option<reqwest::Response>, ApiError> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn parse_json<T: DeserializeOwned>(
        response: reqwest::Response,
        url: &str,
    ) -> Result<T, ApiError> {
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            debug!(url = url, error = %e, "Failed to parse JSON response");
            ApiError::InvalidResponse(format!("Failed to parse response from {}: {}", url, e))
        })
    }

    /// Send a request built by `build`, retrying with exponential backoff on 429.
    /// Only reads go through here.
    async fn execute<T: DeserializeOwned>(
        &self,
        url: &str,
        build: impl Fn() -> RequestBuilder,
    ) -> Result<T, ApiError> {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = build().headers(self.auth_headers()?).send().await?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => return Self::parse_json(response, url).await,
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited);
                    }
                    warn!(url = url, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2;
                }
            }
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T, ApiError> {
        let url = self.url(path);
        self.execute(&url, || self.client.get(&url).query(query)).await
    }

    /// Send a write exactly once. A 429 comes back as `RateLimited`.
    async fn send_once<T: DeserializeOwned>(&self, url: &str, request: RequestBuilder) -> Result<T, ApiError> {
        let response = request.headers(self.auth_headers()?).send().await?;
        let response = Self::check_response(response).await?;
        Self::parse_json(response, url).await
    }

    async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        let url = self.url(path);
        self.send_once(&url, self.client.post(&url).json(body)).await
    }

    async fn patch<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        let url = self.url(path);
        self.send_once(&url, self.client.patch(&url).json(body)).await
    }

    fn page_query(page: u32, search: Option<&str>) -> Vec<(&'static str, String)> {
        let mut query = vec![("page", page.max(1).to_string())];
        if let Some(search) = search {
            query.push(("search", search.to_string()));
        }
        query
    }

    // ===== Data Fetching Methods =====

    pub async fn fetch_applications(
        &self,
        page: u32,
        search: Option<&str>,
    ) -> Result<Page<ApplicationSummary>, ApiError> {
        self.get(APPLICATIONS_PATH, &Self::page_query(page, search)).await
    }

    pub async fn fetch_exam_subjects(&self, page: u32) -> Result<Page<ExamSubject>, ApiError> {
        self.get(SUBJECTS_PATH, &Self::page_query(page, None)).await
    }

    pub async fn fetch_statistics(&self) -> Result<AdmissionStatistics, ApiError> {
        self.get(STATISTICS_PATH, &[]).await
    }

    pub async fn fetch_staff(&self, page: u32) -> Result<Page<StaffMember>, ApiError> {
        self.get(STAFF_PATH, &Self::page_query(page, None)).await
    }

    pub async fn fetch_places(&self, admission_id: i64, page: u32) -> Result<Page<Place>, ApiError> {
        let path = Resource::Places { admission_id }.path();
        self.get(&path, &Self::page_query(page, None)).await
    }

    // ===== Write Methods =====

    pub async fn create_exam_subject(&self, subject: &NewExamSubject) -> Result<ExamSubject, ApiError> {
        self.post(SUBJECTS_PATH, subject).await
    }

    pub async fn update_exam_subject(
        &self,
        id: i64,
        subject: &NewExamSubject,
    ) -> Result<ExamSubject, ApiError> {
        self.patch(&format!("{}{}/", SUBJECTS_PATH, id), subject).await
    }

    pub async fn update_application(
        &self,
        id: i64,
        update: &ApplicationUpdate,
    ) -> Result<ApplicationSummary, ApiError> {
        self.patch(&format!("{}{}/", APPLICATIONS_PATH, id), update).await
    }

    pub async fn set_application_status(
        &self,
        id: i64,
        status: ApplicationStatus,
    ) -> Result<ApplicationSummary, ApiError> {
        self.patch(&format!("{}{}/", APPLICATIONS_PATH, id), &StatusChange { status })
            .await
    }

    pub async fn create_staff_member(&self, member: &NewStaffMember) -> Result<StaffMember, ApiError> {
        self.post(STAFF_PATH, member).await
    }

    pub async fn upload_file(&self, file: &FileUpload) -> Result<UploadedFile, ApiError> {
        let url = self.url(UPLOAD_PATH);
        let part = reqwest::multipart::Part::bytes(file.bytes.clone())
            .file_name(file.file_name.clone());
        let part = match part.mime_str(file.mime_type()) {
            Ok(part) => part,
            Err(_) => reqwest::multipart::Part::bytes(file.bytes.clone())
                .file_name(file.file_name.clone()),
        };
        let form = reqwest::multipart::Form::new().part("file", part);
        self.send_once(&url, self.client.post(&url).multipart(form)).await
    }
}

#[async_trait]
impl Backend for ApiClient {
    async fn read(&self, key: &QueryKey) -> Result<ResourcePayload, ApiError> {
        debug!(key = %key, "Fetching resource");
        let payload = match &key.resource {
            Resource::Applications => {
                ResourcePayload::Applications(self.fetch_applications(key.page, key.filter.as_deref()).await?)
            }
            Resource::ExamSubjects => ResourcePayload::ExamSubjects(self.fetch_exam_subjects(key.page).await?),
            Resource::Statistics => ResourcePayload::Statistics(self.fetch_statistics().await?),
            Resource::Staff => ResourcePayload::Staff(self.fetch_staff(key.page).await?),
            Resource::Places { admission_id } => {
                ResourcePayload::Places(self.fetch_places(*admission_id, key.page).await?)
            }
        };
        Ok(payload)
    }

    async fn write(&self, mutation: &Mutation) -> Result<MutationOutcome, ApiError> {
        let receipt = match mutation {
            Mutation::CreateExamSubject(subject) => {
                MutationOutcome::ExamSubject(self.create_exam_subject(subject).await?)
            }
            Mutation::UpdateExamSubject { id, subject } => {
                MutationOutcome::ExamSubject(self.update_exam_subject(*id, subject).await?)
            }
            Mutation::UpdateApplication { id, update } => {
                MutationOutcome::Application(self.update_application(*id, update).await?)
            }
            Mutation::SetApplicationStatus { id, status } => {
                MutationOutcome::Application(self.set_application_status(*id, *status).await?)
            }
            Mutation::CreateStaffMember(member) => {
                MutationOutcome::StaffMember(self.create_staff_member(member).await?)
            }
        };
        Ok(receipt)
    }
}

#[async_trait]
impl FileUploader for ApiClient {
    async fn upload(&self, file: FileUpload) -> Result<UploadedFile, ApiError> {
        self.upload_file(&file).await
    }
}

#[async_trait]
impl ApplicationSubmitter for ApiClient {
    async fn submit_application(
        &self,
        draft: &ApplicationDraft,
    ) -> Result<SubmittedApplication, ApiError> {
        self.post(APPLICATIONS_PATH, draft).await
    }
}
