use anyhow::{Context, Result};
use keyring::Entry;

const SERVICE_NAME: &str = "admitdesk";

pub struct CredentialStore;

impl CredentialStore {
    /// Store username and password in the OS keychain
    pub fn store(username: &str, password: &str) -> Result<()> {
        Self::entry(username)?
            .set_password(password)
            .context("Failed to store password in keychain")
    }

    /// Retrieve the remembered password for a username
    pub fn get_password(username: &str) -> Result<String> {
        Self::entry(username)?
            .get_password()
            .context("Failed to retrieve password from keychain")
    }

    /// Forget the stored password. A missing entry is not an error.
    pub fn delete(username: &str) -> Result<()> {
        match Self::entry(username)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete credential from keychain"),
        }
    }

    pub fn has_credentials(username: &str) -> bool {
        Self::entry(username)
            .map(|entry| entry.get_password().is_ok())
            .unwrap_or(false)
    }

    fn entry(username: &str) -> Result<Entry> {
        Entry::new(SERVICE_NAME, username).context("Failed to create keyring entry")
    }
}
