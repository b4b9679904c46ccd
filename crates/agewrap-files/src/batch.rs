//! Directory batches: encrypt or decrypt every regular file in one directory
//!
//! Files are processed one at a time in sorted order. Each result is
//! transport-encoded text (encrypt) or raw plaintext (decrypt) written back
//! over the source through [`RotateOnWrite`], so a failure on one file
//! never disturbs files already committed. Subdirectories and dotfiles
//! (which include rotate-on-write temp files) are ignored.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use agewrap_crypto::{x25519, Identity, Recipient, TransportEncoding};
use rand::rngs::OsRng;
use secrecy::{ExposeSecret, SecretString};

use crate::rotate::RotateOnWrite;

/// Progress callback type (files_done, files_total, current_path)
pub type ProgressFn = Box<dyn Fn(usize, usize, &Path) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Stop after the first failing file; remaining files are reported as skipped
    pub fail_fast: bool,
    /// Text encoding of the ciphertext files
    pub encoding: TransportEncoding,
    /// Prune each file's backups to this many after it is rewritten
    pub keep_backups: Option<usize>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            fail_fast: true,
            encoding: TransportEncoding::default(),
            keep_backups: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Outcome of a directory batch
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Files rewritten successfully
    pub processed: Vec<PathBuf>,
    /// Files that failed, with the reason
    pub failed: Vec<BatchFailure>,
    /// Files never attempted because the batch stopped early
    pub skipped: Vec<PathBuf>,
}

impl BatchReport {
    /// Every file in the directory was processed.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }
}

/// Encrypt every regular file in `dir` for `public_key`, replacing each
/// with its transport-encoded container.
///
/// The key is parsed before any file is touched; a bad key is an error,
/// not a per-file failure.
pub async fn encrypt_dir(
    dir: &Path,
    rotate: &RotateOnWrite,
    public_key: &str,
    prefix: &str,
    options: &BatchOptions,
    progress: Option<&ProgressFn>,
) -> Result<BatchReport> {
    let recipient = x25519::Recipient::from_prefixed_str(public_key, prefix)
        .context("parsing recipient public key")?;
    let encoding = options.encoding;

    let transform = move |plaintext: Vec<u8>| -> Result<Vec<u8>> {
        let container = agewrap_crypto::encrypt(&[Recipient::from(recipient)], &plaintext, &mut OsRng)?;
        Ok(encoding.encode(&container).into_bytes())
    };
    process_dir(dir, rotate, options, progress, "encrypt", Arc::new(transform)).await
}

/// Decrypt every regular file in `dir` with `private_key`, replacing each
/// transport-encoded container with its plaintext.
pub async fn decrypt_dir(
    dir: &Path,
    rotate: &RotateOnWrite,
    private_key: &SecretString,
    prefix: &str,
    options: &BatchOptions,
    progress: Option<&ProgressFn>,
) -> Result<BatchReport> {
    let identity = x25519::Identity::from_prefixed_str(private_key.expose_secret(), prefix)
        .context("parsing private key")?;
    let identities = [Identity::from(identity)];
    let encoding = options.encoding;

    let transform = move |text: Vec<u8>| -> Result<Vec<u8>> {
        let text = std::str::from_utf8(&text).context("ciphertext file is not text")?;
        let container = encoding.decode(text.trim_end())?;
        Ok(agewrap_crypto::decrypt(&identities, &container)?)
    };
    process_dir(dir, rotate, options, progress, "decrypt", Arc::new(transform)).await
}

async fn process_dir<F>(
    dir: &Path,
    rotate: &RotateOnWrite,
    options: &BatchOptions,
    progress: Option<&ProgressFn>,
    operation: &'static str,
    transform: Arc<F>,
) -> Result<BatchReport>
where
    F: Fn(Vec<u8>) -> Result<Vec<u8>> + Send + Sync + 'static,
{
    let files = collect_files(dir).await?;
    let total = files.len();
    debug!(dir = %dir.display(), files = total, operation, "starting batch");

    let mut report = BatchReport::default();
    let mut stopped = false;

    for (i, path) in files.into_iter().enumerate() {
        if stopped {
            report.skipped.push(path);
            continue;
        }

        match process_file(&path, rotate, options, Arc::clone(&transform)).await {
            Ok(bytes) => {
                debug!(path = %path.display(), bytes, operation, "file done");
                if let Some(cb) = progress {
                    cb(i + 1, total, &path);
                }
                report.processed.push(path);
            }
            Err(e) => {
                warn!(path = %path.display(), operation, "file failed: {e:#}");
                if let Some(cb) = progress {
                    cb(i + 1, total, &path);
                }
                report.failed.push(BatchFailure {
                    path,
                    error: format!("{e:#}"),
                });
                stopped = options.fail_fast;
            }
        }
    }

    info!(
        dir = %dir.display(),
        operation,
        processed = report.processed.len(),
        failed = report.failed.len(),
        skipped = report.skipped.len(),
        "batch finished"
    );
    Ok(report)
}

async fn process_file<F>(
    path: &Path,
    rotate: &RotateOnWrite,
    options: &BatchOptions,
    transform: Arc<F>,
) -> Result<usize>
where
    F: Fn(Vec<u8>) -> Result<Vec<u8>> + Send + Sync + 'static,
{
    let input = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;

    let output = tokio::task::spawn_blocking(move || (*transform)(input))
        .await
        .context("crypto task panicked")??;

    let written = rotate.write(path, &output).await?;
    if let Some(keep) = options.keep_backups {
        rotate.cleanup_backups(path, keep).await?;
    }
    Ok(written)
}

/// Regular, non-hidden files directly inside `dir`, sorted by path.
async fn collect_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("reading dir: {}", dir.display()))?;

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await.context("reading dir entry")? {
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        let file_type = entry.file_type().await.context("stat dir entry")?;
        if file_type.is_file() {
            files.push(entry.path());
        }
    }
    files.sort(); // deterministic order
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_collect_files_skips_dirs_and_dotfiles() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "b").unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        std::fs::write(dir.path().join(".hidden"), "h").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub").join("c.txt"), "c").unwrap();

        let files = collect_files(dir.path()).await.unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, ["a.txt", "b.txt"]);
    }

    #[test]
    fn test_report_completeness() {
        let mut report = BatchReport::default();
        assert!(report.is_complete());
        report.skipped.push(PathBuf::from("x"));
        assert!(!report.is_complete());
    }

    #[test]
    fn test_default_options() {
        let options = BatchOptions::default();
        assert!(options.fail_fast);
        assert_eq!(options.encoding, TransportEncoding::RawStd);
        assert!(options.keep_backups.is_none());
    }
}
