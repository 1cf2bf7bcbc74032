use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Session file name in cache directory
const SESSION_FILE: &str = "session.json";

/// Lifetime of an access token issued by `auth/login/`.
const ACCESS_TOKEN_MINUTES: i64 = 5;

/// Refresh this long before the access token runs out
const ACCESS_REFRESH_BUFFER_MINUTES: i64 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionTokens {
    pub access: String,
    pub refresh: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
    /// When `access` was last issued.
    pub refreshed_at: DateTime<Utc>,
}

impl SessionTokens {
    /// True once the access token is within the refresh buffer of expiring
    pub fn needs_refresh(&self) -> bool {
        let refresh_at = self.refreshed_at
            + Duration::minutes(ACCESS_TOKEN_MINUTES - ACCESS_REFRESH_BUFFER_MINUTES);
        Utc::now() > refresh_at
    }

    pub fn access_expires_at(&self) -> DateTime<Utc> {
        self.refreshed_at + Duration::minutes(ACCESS_TOKEN_MINUTES)
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Not logged in")]
pub struct AuthRequired;

pub struct Session {
    cache_dir: PathBuf,
    pub data: Option<SessionTokens>,
}

impl Session {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self {
            cache_dir,
            data: None,
        }
    }

    /// Load session from disk. Returns whether a session was found.
    pub fn load(&mut self) -> Result<bool> {
        let path = self.session_path();
        if !path.exists() {
            return Ok(false);
        }
        let contents = std::fs::read_to_string(&path).context("Failed to read session file")?;
        let data: SessionTokens =
            serde_json::from_str(&contents).context("Failed to parse session file")?;
        debug!(username = %data.username, "Loaded session");
        self.data = Some(data);
        Ok(true)
    }

    /// Save session to disk
    pub fn save(&self) -> Result<()> {
        if let Some(ref data) = self.data {
            let path = self.session_path();
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).context("Failed to create session directory")?;
            }
            let contents = serde_json::to_string_pretty(data)?;
            std::fs::write(&path, contents).context("Failed to write session file")?;
        }
        Ok(())
    }

    /// Forget the tokens, in memory and on disk
    pub fn clear(&mut self) -> Result<()> {
        self.data = None;
        let path = self.session_path();
        if path.exists() {
            std::fs::remove_file(path).context("Failed to remove session file")?;
        }
        Ok(())
    }

    pub fn update(&mut self, data: SessionTokens) {
        self.data = Some(data);
    }

    /// Replace the access token after a refresh
    pub fn set_access(&mut self, access: String) {
        if let Some(ref mut data) = self.data {
            data.access = access;
            data.refreshed_at = Utc::now();
        }
    }

    pub fn access_token(&self) -> Option<&str> {
        self.data.as_ref().map(|d| d.access.as_str())
    }

    /// Logged in means holding a refresh token.
    pub fn is_authenticated(&self) -> bool {
        self.data.as_ref().is_some_and(|d| !d.refresh.is_empty())
    }

    pub fn require_login(&self) -> Result<&SessionTokens, AuthRequired> {
        self.data
            .as_ref()
            .filter(|d| !d.refresh.is_empty())
            .ok_or(AuthRequired)
    }

    fn session_path(&self) -> PathBuf {
        self.cache_dir.join(SESSION_FILE)
    }
}
