use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const CREDENTIALS_VERSION: u32 = 1;

fn default_credentials_version() -> u32 {
    CREDENTIALS_VERSION
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CredentialFile {
    #[serde(default = "default_credentials_version")]
    version: u32,
    /// Bearer token issued at login; presence implies unlimited usage.
    #[serde(default)]
    access_token: Option<String>,
    /// Identity under which the server tracks anonymous quota.
    #[serde(default)]
    anonymous_id: Option<String>,
}

impl Default for CredentialFile {
    fn default() -> Self {
        Self {
            version: CREDENTIALS_VERSION,
            access_token: None,
            anonymous_id: None,
        }
    }
}

/// Persistent credential storage: one JSON file under the data directory
/// holding the bearer token and the anonymous identity.
///
/// All mutators write through to disk so a crash never leaves a token in
/// memory only.
pub struct CredentialStore {
    path: PathBuf,
    state: Mutex<CredentialFile>,
}

impl CredentialStore {
    pub fn load_or_init(path: &Path) -> Result<Self> {
        let state = if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read credential store: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse credential store: {}", path.display()))?
        } else {
            CredentialFile::default()
        };

        Ok(Self {
            path: path.to_path_buf(),
            state: Mutex::new(state),
        })
    }

    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.state
            .lock()
            .expect("credential lock poisoned")
            .access_token
            .clone()
    }

    pub fn set_token(&self, token: &str) -> Result<()> {
        let mut state = self.state.lock().expect("credential lock poisoned");
        state.access_token = Some(token.to_string());
        self.persist(&state)
    }

    pub fn clear_token(&self) -> Result<()> {
        let mut state = self.state.lock().expect("credential lock poisoned");
        state.access_token = None;
        self.persist(&state)
    }

    #[must_use]
    pub fn anonymous_id(&self) -> Option<String> {
        self.state
            .lock()
            .expect("credential lock poisoned")
            .anonymous_id
            .clone()
    }

    pub fn set_anonymous_id(&self, id: &str) -> Result<()> {
        let mut state = self.state.lock().expect("credential lock poisoned");
        if state.anonymous_id.as_deref() == Some(id) {
            return Ok(());
        }
        state.anonymous_id = Some(id.to_string());
        self.persist(&state)
    }

    /// Return the stored anonymous id, minting one when none exists yet.
    /// The server issues ids too; a server-supplied id replaces a local one
    /// via [`CredentialStore::set_anonymous_id`].
    pub fn ensure_anonymous_id(&self) -> Result<String> {
        let mut state = self.state.lock().expect("credential lock poisoned");
        if let Some(id) = &state.anonymous_id {
            return Ok(id.clone());
        }
        let id = uuid::Uuid::new_v4().to_string();
        state.anonymous_id = Some(id.clone());
        self.persist(&state)?;
        Ok(id)
    }

    fn persist(&self, state: &CredentialFile) -> Result<()> {
        let parent = self.path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent).with_context(|| {
            format!(
                "Failed to create credential store parent directory: {}",
                parent.display()
            )
        })?;
        let json = serde_json::to_string_pretty(state)?;
        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write credential store: {}", self.path.display()))
    }
}
