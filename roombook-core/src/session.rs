//! Saved provider credentials.
//!
//! Adapters authenticate with a previously-acquired access token saved to a
//! TOML file by the out-of-band auth flow. Loading checks expiry so a stale
//! token surfaces as a clear `ProviderUnavailable` instead of a remote 401.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};

/// Contents of a credentials file referenced by `ProviderConfig.credentials_ref`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    /// When the token stops working. Absent for long-lived tokens.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    /// Account the token belongs to, for diagnostics only.
    #[serde(default)]
    pub account: Option<String>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }

    /// Load a session, rejecting missing files and expired tokens.
    pub fn load(path: &Path) -> SyncResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SyncError::ProviderUnavailable(format!(
                "cannot read credentials file {}: {}",
                path.display(),
                e
            ))
        })?;

        let session: Session = toml::from_str(&content).map_err(|e| {
            SyncError::ProviderUnavailable(format!(
                "credentials file {} is malformed: {}",
                path.display(),
                e
            ))
        })?;

        if session.is_expired(Utc::now()) {
            return Err(SyncError::ProviderUnavailable(format!(
                "access token in {} has expired; re-run the auth flow",
                path.display()
            )));
        }

        Ok(session)
    }
}
