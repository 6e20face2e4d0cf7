use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use keyring::Entry;
use serde::{Deserialize, Serialize};

use super::session::Credential;

const SERVICE_NAME: &str = "inkpost";

/// Keychain account under which the bearer token is filed
const KEYRING_ACCOUNT: &str = "access-token";

/// Credential file name in cache directory
const CREDENTIAL_FILE: &str = "credential.json";

/// Durable storage for the single bearer credential.
///
/// Every method is synchronous: the session is not considered changed until
/// the store has been written, so a reload can never resurrect a cleared
/// token.
pub trait CredentialStore: Send + Sync {
    /// Read the stored credential, `None` when there is no session
    fn load(&self) -> Result<Option<Credential>>;

    /// Replace the stored credential
    fn save(&self, credential: &Credential) -> Result<()>;

    /// Remove the stored credential. Clearing an empty store is not an error.
    fn clear(&self) -> Result<()>;
}

/// OS keychain backed store
pub struct KeyringStore {
    account: String,
}

impl KeyringStore {
    pub fn new() -> Self {
        Self {
            account: KEYRING_ACCOUNT.to_string(),
        }
    }

    /// Store under a different keychain account (one per server, for example)
    pub fn with_account(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
        }
    }

    fn entry(&self) -> Result<Entry> {
        Entry::new(SERVICE_NAME, &self.account).context("Failed to create keyring entry")
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for KeyringStore {
    fn load(&self) -> Result<Option<Credential>> {
        match self.entry()?.get_password() {
            Ok(token) => Ok(Some(Credential::new(token))),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve token from keychain"),
        }
    }

    fn save(&self, credential: &Credential) -> Result<()> {
        self.entry()?
            .set_password(credential.as_str())
            .context("Failed to store token in keychain")
    }

    fn clear(&self) -> Result<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete token from keychain"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredCredential {
    access_token: Credential,
    stored_at: DateTime<Utc>,
}

/// Plain JSON file in the cache directory, for machines without a keychain
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path(&self) -> PathBuf {
        self.dir.join(CREDENTIAL_FILE)
    }
}

impl CredentialStore for FileStore {
    fn load(&self) -> Result<Option<Credential>> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path).context("Failed to read credential file")?;
        let stored: StoredCredential =
            serde_json::from_str(&contents).context("Failed to parse credential file")?;
        if stored.access_token.as_str().is_empty() {
            return Ok(None);
        }
        Ok(Some(stored.access_token))
    }

    fn save(&self, credential: &Credential) -> Result<()> {
        std::fs::create_dir_all(&self.dir).context("Failed to create credential directory")?;
        let stored = StoredCredential {
            access_token: credential.clone(),
            stored_at: Utc::now(),
        };
        let contents = serde_json::to_string_pretty(&stored)?;
        write_private(&self.path(), &contents).context("Failed to write credential file")?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let path = self.path();
        if path.exists() {
            std::fs::remove_file(path).context("Failed to remove credential file")?;
        }
        Ok(())
    }
}

/// Write `contents` readable by the owner only.
#[cfg(unix)]
fn write_private(path: &Path, contents: &str) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // `mode` only applies on creation; tighten a file left by an older version
    file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    file.write_all(contents.as_bytes())
}

#[cfg(not(unix))]
fn write_private(path: &Path, contents: &str) -> std::io::Result<()> {
    std::fs::write(path, contents)
}

/// Process-local store; nothing survives a restart
#[derive(Default)]
pub struct MemoryStore {
    slot: Mutex<Option<Credential>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(credential: Credential) -> Self {
        Self {
            slot: Mutex::new(Some(credential)),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Credential>> {
        // A panic while holding this lock cannot leave the Option half-written
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CredentialStore for MemoryStore {
    fn load(&self) -> Result<Option<Credential>> {
        Ok(self.lock().clone())
    }

    fn save(&self, credential: &Credential) -> Result<()> {
        *self.lock() = Some(credential.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.lock() = None;
        Ok(())
    }
}
