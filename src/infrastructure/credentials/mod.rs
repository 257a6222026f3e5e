//! File-based secret store (`spec.md` §6: "one file per identity,
//! permissions 0600, contents = raw credential string").

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::errors::BootError;
use crate::domain::ports::CredentialStore;

/// Loads every file in `secret_dir` at boot into an in-memory map keyed by
/// file stem (the identity ref). Credentials are read-only after boot
/// (`spec.md` §5) and never logged.
pub struct FileCredentialStore {
    secrets: HashMap<String, String>,
}

impl FileCredentialStore {
    pub fn load(secret_dir: impl AsRef<Path>) -> Result<Self, BootError> {
        let dir = secret_dir.as_ref();
        let mut secrets = HashMap::new();

        if !dir.exists() {
            return Ok(Self { secrets });
        }

        let entries = fs::read_dir(dir)
            .map_err(|e| BootError::SecretIo(dir.display().to_string(), e.to_string()))?;

        for entry in entries {
            let entry = entry.map_err(|e| BootError::SecretIo(dir.display().to_string(), e.to_string()))?;
            let path: PathBuf = entry.path();
            if !path.is_file() {
                continue;
            }
            let identity_ref = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();

            check_permissions(&path, &identity_ref)?;

            let contents = fs::read_to_string(&path)
                .map_err(|e| BootError::SecretIo(identity_ref.clone(), e.to_string()))?;
            secrets.insert(identity_ref, contents.trim().to_string());
        }

        Ok(Self { secrets })
    }

    pub fn in_memory(secrets: HashMap<String, String>) -> Self {
        Self { secrets }
    }
}

impl CredentialStore for FileCredentialStore {
    fn resolve(&self, identity_ref: &str) -> Result<String, BootError> {
        self.secrets
            .get(identity_ref)
            .cloned()
            .ok_or_else(|| BootError::SecretIo(identity_ref.to_string(), "no such identity".to_string()))
    }
}

#[cfg(unix)]
fn check_permissions(path: &Path, identity_ref: &str) -> Result<(), BootError> {
    use std::os::unix::fs::PermissionsExt;
    let meta = fs::metadata(path)
        .map_err(|e| BootError::SecretIo(identity_ref.to_string(), e.to_string()))?;
    let mode = meta.permissions().mode() & 0o777;
    if mode != 0o600 {
        return Err(BootError::InsecurePermissions(
            identity_ref.to_string(),
            format!("expected 0600, found {mode:o}"),
        ));
    }
    Ok(())
}

#[cfg(not(unix))]
fn check_permissions(_path: &Path, _identity_ref: &str) -> Result<(), BootError> {
    Ok(())
}
