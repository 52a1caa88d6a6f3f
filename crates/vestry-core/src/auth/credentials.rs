use anyhow::{Context, Result};
use keyring::Entry;

const SERVICE_NAME: &str = "vestry";

/// Admin access tokens in the OS keychain, keyed by project URL
pub struct CredentialStore;

impl CredentialStore {
    fn entry(project_url: &str) -> Result<Entry> {
        Entry::new(SERVICE_NAME, project_url.trim_end_matches('/'))
            .context("Failed to create keyring entry")
    }

    /// Store the admin access token for a project
    pub fn store(project_url: &str, token: &str) -> Result<()> {
        Self::entry(project_url)?
            .set_password(token)
            .context("Failed to store access token in keychain")?;
        Ok(())
    }

    /// Retrieve the admin access token for a project
    pub fn get_token(project_url: &str) -> Result<String> {
        Self::entry(project_url)?
            .get_password()
            .context("Failed to retrieve access token from keychain")
    }

    /// Delete the stored token for a project
    pub fn delete(project_url: &str) -> Result<()> {
        Self::entry(project_url)?
            .delete_credential()
            .context("Failed to delete access token from keychain")?;
        Ok(())
    }

    pub fn has_token(project_url: &str) -> bool {
        Self::get_token(project_url).is_ok()
    }
}
