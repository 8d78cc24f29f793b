//! Advisory lock that keeps two runs from writing the same vault.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;
use tracing::{debug, warn};

/// Lock file name inside the vault root
pub const LOCK_FILE: &str = ".audionote.lock";

/// Held for the duration of a run; released on drop
#[derive(Debug)]
pub struct VaultLock {
    file: File,
    path: PathBuf,
}

impl VaultLock {
    /// Take the vault lock without waiting.
    ///
    /// Fails when another process already holds it.
    pub fn acquire(vault_root: &Path) -> Result<Self> {
        std::fs::create_dir_all(vault_root)
            .with_context(|| format!("Failed to create vault: {}", vault_root.display()))?;

        let path = vault_root.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .with_context(|| format!("Failed to open lock file: {}", path.display()))?;

        file.try_lock_exclusive().with_context(|| {
            format!(
                "Vault is locked by another run ({}); try again once it finishes",
                path.display()
            )
        })?;

        debug!(path = %path.display(), "Acquired vault lock");
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for VaultLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            warn!(path = %self.path.display(), "Failed to release vault lock: {}", e);
        }
    }
}
