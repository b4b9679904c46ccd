//! Rotate-on-write: replace a file while preserving its previous version
//!
//! Write flow:
//!   1. Create a uniquely named temp sibling carrying the destination's
//!      permissions (if it exists), write the new bytes and fsync
//!   2. Copy the current file (if any) into the backup directory
//!   3. Rename the temp file over the destination
//!
//! The rename is the only step that touches the destination, so a failure
//! anywhere before it leaves the old content in place. The temp file is
//! removed on every error path.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Marker between the file name and the timestamp in backup names.
const BACKUP_MARKER: &str = ".bak.";

/// Replaces files atomically, keeping prior versions under `backup_dir`.
#[derive(Debug, Clone)]
pub struct RotateOnWrite {
    backup_dir: PathBuf,
}

impl RotateOnWrite {
    pub fn new(backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            backup_dir: backup_dir.into(),
        }
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Replace `path` with `bytes`, returning the number of bytes written.
    ///
    /// If `path` already exists its current content is preserved as
    /// `{backup_dir}/{name}.bak.{millis}` before the replacement.
    pub async fn write(&self, path: &Path, bytes: &[u8]) -> Result<usize> {
        let name = file_name(path)?;
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let tmp_path = parent.join(format!(".{name}.{}.tmp", uuid::Uuid::new_v4()));

        let result = self.commit(path, &name, &tmp_path, bytes).await;
        if result.is_err() {
            if let Err(e) = tokio::fs::remove_file(&tmp_path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %tmp_path.display(), "failed to remove temp file: {e}");
                }
            }
        }
        let backup = result?;

        info!(
            path = %path.display(),
            bytes = bytes.len(),
            backup = ?backup,
            "file rotated"
        );
        Ok(bytes.len())
    }

    async fn commit(
        &self,
        path: &Path,
        name: &str,
        tmp_path: &Path,
        bytes: &[u8],
    ) -> Result<Option<PathBuf>> {
        let existing = match tokio::fs::metadata(path).await {
            Ok(meta) => Some(meta),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e).with_context(|| format!("stat {}", path.display())),
        };

        let mut tmp = tokio::fs::File::create(tmp_path)
            .await
            .with_context(|| format!("creating temp file: {}", tmp_path.display()))?;
        if let Some(meta) = &existing {
            // Only the content changes; the mode stays what it was
            tmp.set_permissions(meta.permissions())
                .await
                .with_context(|| format!("copying permissions of {}", path.display()))?;
        }
        tmp.write_all(bytes)
            .await
            .with_context(|| format!("writing temp file: {}", tmp_path.display()))?;
        tmp.sync_all()
            .await
            .with_context(|| format!("syncing temp file: {}", tmp_path.display()))?;
        drop(tmp);

        let backup = match existing {
            Some(_) => Some(self.backup(path, name).await?),
            None => None,
        };

        tokio::fs::rename(tmp_path, path)
            .await
            .with_context(|| format!("replacing {}", path.display()))?;
        Ok(backup)
    }

    async fn backup(&self, path: &Path, name: &str) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.backup_dir)
            .await
            .with_context(|| format!("creating backup dir: {}", self.backup_dir.display()))?;

        let stamp = now_millis();
        let mut backup_path = self.backup_dir.join(format!("{name}{BACKUP_MARKER}{stamp:013}"));
        let mut n = 1u32;
        while tokio::fs::try_exists(&backup_path).await.unwrap_or(false) {
            backup_path = self
                .backup_dir
                .join(format!("{name}{BACKUP_MARKER}{stamp:013}-{n:03}"));
            n += 1;
        }

        tokio::fs::copy(path, &backup_path).await.with_context(|| {
            format!("backing up {} -> {}", path.display(), backup_path.display())
        })?;
        debug!(backup = %backup_path.display(), "previous version preserved");
        Ok(backup_path)
    }

    /// Remove all but the newest `keep` backups of `path`. Returns how many
    /// were removed.
    pub async fn cleanup_backups(&self, path: &Path, keep: usize) -> Result<usize> {
        let name = file_name(path)?;
        let prefix = format!("{name}{BACKUP_MARKER}");

        let mut entries = match tokio::fs::read_dir(&self.backup_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("reading backup dir: {}", self.backup_dir.display())
                })
            }
        };

        let mut backups: Vec<(String, PathBuf)> = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let entry_name = entry.file_name().to_string_lossy().to_string();
            let is_ours = entry_name
                .strip_prefix(&prefix)
                .is_some_and(is_backup_stamp);
            if is_ours {
                backups.push((entry_name, entry.path()));
            }
        }

        if backups.len() <= keep {
            return Ok(0);
        }

        // zero-padded timestamps sort oldest first
        backups.sort_by(|a, b| a.0.cmp(&b.0));

        let to_remove = backups.len() - keep;
        let mut removed = 0;
        for (_, backup) in backups.iter().take(to_remove) {
            match tokio::fs::remove_file(backup).await {
                Ok(()) => {
                    debug!(backup = %backup.display(), "removed old backup");
                    removed += 1;
                }
                Err(e) => warn!(backup = %backup.display(), "failed to remove backup: {e}"),
            }
        }
        Ok(removed)
    }
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .with_context(|| format!("path has no file name: {}", path.display()))
}

/// `{millis:013}` optionally followed by `-{n:03}`.
fn is_backup_stamp(rest: &str) -> bool {
    let (stamp, counter) = match rest.split_once('-') {
        Some((stamp, counter)) => (stamp, Some(counter)),
        None => (rest, None),
    };
    let digits = |s: &str, len: usize| s.len() == len && s.bytes().all(|b| b.is_ascii_digit());
    digits(stamp, 13) && counter.map_or(true, |c| digits(c, 3))
}

fn now_millis() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}
