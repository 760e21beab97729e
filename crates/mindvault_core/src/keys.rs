//! At-rest encryption key lifecycle.
//!
//! # Responsibility
//! - Create, load and delete the single symmetric export key.
//! - Keep key material out of logs and error messages.
//!
//! # Invariants
//! - The key file is created with owner-only permissions on Unix.
//! - `get_or_create_key` is stable: repeated calls return the same key until
//!   `delete_key` removes it.
//! - Key unavailability is a recoverable, logged condition for store init and
//!   a hard failure for operations that requested encryption.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use log::warn;
use rand::rngs::OsRng;
use rand::RngCore;
use std::env;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const KEY_LEN: usize = 32;

/// Symmetric key used by encrypted export paths.
pub type EncryptionKey = [u8; KEY_LEN];

/// Key-manager failure. Never carries key bytes.
#[derive(Debug)]
pub enum KeyError {
    /// The backing location cannot be read or written.
    VaultUnavailable(std::io::Error),
    /// The stored key file is malformed.
    Corrupt,
}

impl Display for KeyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::VaultUnavailable(err) => write!(f, "key vault unavailable: {err}"),
            Self::Corrupt => write!(f, "stored key material is malformed"),
        }
    }
}

impl Error for KeyError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::VaultUnavailable(err) => Some(err),
            Self::Corrupt => None,
        }
    }
}

impl From<std::io::Error> for KeyError {
    fn from(value: std::io::Error) -> Self {
        Self::VaultUnavailable(value)
    }
}

/// File-backed manager for the single export key.
#[derive(Debug, Clone)]
pub struct KeyManager {
    key_path: PathBuf,
}

impl KeyManager {
    /// Manager over the platform-default key location.
    ///
    /// `MINDVAULT_KEY_PATH` overrides the default for tests and non-standard
    /// deployments.
    pub fn default_local() -> Self {
        let key_path = env::var("MINDVAULT_KEY_PATH")
            .ok()
            .map(PathBuf::from)
            .unwrap_or_else(default_key_path);
        Self::for_path(key_path)
    }

    /// Manager over an explicit key file path.
    pub fn for_path(key_path: impl Into<PathBuf>) -> Self {
        Self {
            key_path: key_path.into(),
        }
    }

    /// Returns the stable export key, generating and persisting one on first
    /// call.
    ///
    /// # Errors
    /// - `VaultUnavailable` when the key location cannot be read or created.
    /// - `Corrupt` when an existing key file fails to decode.
    pub fn get_or_create_key(&self) -> Result<EncryptionKey, KeyError> {
        if self.key_path.exists() {
            let encoded = fs::read_to_string(&self.key_path)?;
            let decoded = BASE64
                .decode(encoded.trim().as_bytes())
                .map_err(|_| KeyError::Corrupt)?;
            if decoded.len() != KEY_LEN {
                return Err(KeyError::Corrupt);
            }
            let mut key = [0u8; KEY_LEN];
            key.copy_from_slice(&decoded);
            return Ok(key);
        }

        if let Some(parent) = self.key_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut key = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        write_new_file_restricted(&self.key_path, BASE64.encode(key).as_bytes())?;
        Ok(key)
    }

    /// Tries to obtain the key, degrading to `None` on vault failure.
    ///
    /// Store initialization uses this path: a missing vault (e.g. a
    /// non-interactive test environment) disables encryption with a logged
    /// warning instead of failing the open.
    pub fn try_key_for_init(&self) -> Option<EncryptionKey> {
        match self.get_or_create_key() {
            Ok(key) => Some(key),
            Err(err) => {
                warn!(
                    "event=key_unavailable module=keys status=degraded error={err}"
                );
                None
            }
        }
    }

    /// Irrecoverably removes the key. Returns whether a key existed.
    pub fn delete_key(&self) -> Result<bool, KeyError> {
        if !self.key_path.exists() {
            return Ok(false);
        }
        fs::remove_file(&self.key_path)?;
        Ok(true)
    }
}

/// Lowercase hex form of the key, used by SQLCipher raw-key pragmas.
///
/// The returned string is key material; it must only ever be interpolated
/// into `PRAGMA key`/`PRAGMA rekey` statements, never into log lines.
pub(crate) fn hex_key(key: &EncryptionKey) -> String {
    key.iter().map(|byte| format!("{byte:02x}")).collect()
}

fn default_key_path() -> PathBuf {
    if let Ok(xdg_data_home) = env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg_data_home)
            .join("mindvault")
            .join("export.key");
    }
    if let Ok(home) = env::var("HOME") {
        return PathBuf::from(home)
            .join(".local")
            .join("share")
            .join("mindvault")
            .join("export.key");
    }
    PathBuf::from(".mindvault").join("export.key")
}

fn write_new_file_restricted(path: &Path, data: &[u8]) -> Result<(), KeyError> {
    let mut file = OpenOptions::new().create_new(true).write(true).open(path)?;
    file.write_all(data)?;
    file.flush()?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}
