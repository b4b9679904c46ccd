//! Directory batch round trips and per-file failure isolation.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use agewrap_crypto::{generate_key_pair, TransportEncoding};
use agewrap_files::{decrypt_dir, encrypt_dir, BatchOptions, ProgressFn, RotateOnWrite};
use rand::rngs::OsRng;
use secrecy::SecretString;
use tempfile::TempDir;

const PUBLIC_PREFIX: &str = "batchtest";
const PRIVATE_PREFIX: &str = "BATCHTEST-SECRET-";

fn keys() -> (String, SecretString) {
    generate_key_pair(PUBLIC_PREFIX, PRIVATE_PREFIX, &mut OsRng).unwrap()
}

fn write_files(dir: &Path, files: &[(&str, &[u8])]) {
    for (name, content) in files {
        std::fs::write(dir.join(name), content).unwrap();
    }
}

fn backup_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

#[tokio::test]
async fn encrypt_then_decrypt_restores_directory() {
    let work = TempDir::new().unwrap();
    let backups = TempDir::new().unwrap();
    let rotate = RotateOnWrite::new(backups.path());
    let (public, private) = keys();

    let files: [(&str, &[u8]); 3] = [
        ("a.txt", b"alpha"),
        ("b.bin", &[0u8, 1, 2, 255]),
        ("empty", b""),
    ];
    write_files(work.path(), &files);

    let options = BatchOptions::default();
    let report = encrypt_dir(work.path(), &rotate, &public, PUBLIC_PREFIX, &options, None)
        .await
        .unwrap();
    assert!(report.is_complete());
    assert_eq!(report.processed.len(), 3);

    // Ciphertext is transport-encoded text, not the original bytes
    let encrypted = std::fs::read_to_string(work.path().join("a.txt")).unwrap();
    assert_ne!(encrypted.as_bytes(), b"alpha");
    assert!(TransportEncoding::RawStd.decode(&encrypted).is_ok());
    assert_eq!(backup_count(backups.path()), 3);

    let report = decrypt_dir(work.path(), &rotate, &private, PRIVATE_PREFIX, &options, None)
        .await
        .unwrap();
    assert!(report.is_complete());

    for (name, content) in files {
        assert_eq!(std::fs::read(work.path().join(name)).unwrap(), content, "{name}");
    }
    assert_eq!(backup_count(backups.path()), 6);
}

#[tokio::test]
async fn fail_fast_stops_and_reports_skipped() {
    let work = TempDir::new().unwrap();
    let backups = TempDir::new().unwrap();
    let rotate = RotateOnWrite::new(backups.path());
    let (_, private) = keys();

    // "a" is not ciphertext, so it fails first in sorted order
    write_files(work.path(), &[("a", b"plain text!"), ("b", b"also plain"), ("c", b"more")]);

    let report = decrypt_dir(
        work.path(),
        &rotate,
        &private,
        PRIVATE_PREFIX,
        &BatchOptions::default(),
        None,
    )
    .await
    .unwrap();

    assert!(!report.is_complete());
    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].path.ends_with("a"));
    assert_eq!(report.skipped.len(), 2);
    assert!(report.processed.is_empty());
    // Failed file untouched
    assert_eq!(std::fs::read(work.path().join("a")).unwrap(), b"plain text!");
    assert_eq!(backup_count(backups.path()), 0);
}

#[tokio::test]
async fn continue_mode_isolates_failures() {
    let work = TempDir::new().unwrap();
    let backups = TempDir::new().unwrap();
    let rotate = RotateOnWrite::new(backups.path());
    let (public, private) = keys();

    write_files(work.path(), &[("1.txt", b"one"), ("3.txt", b"three")]);
    let options = BatchOptions {
        fail_fast: false,
        ..BatchOptions::default()
    };
    encrypt_dir(work.path(), &rotate, &public, PUBLIC_PREFIX, &options, None)
        .await
        .unwrap();

    // A stray plaintext file lands between two ciphertext files
    write_files(work.path(), &[("2.txt", b"not encrypted")]);

    let report = decrypt_dir(work.path(), &rotate, &private, PRIVATE_PREFIX, &options, None)
        .await
        .unwrap();

    assert_eq!(report.processed.len(), 2);
    assert_eq!(report.failed.len(), 1);
    assert!(report.skipped.is_empty());
    assert_eq!(std::fs::read(work.path().join("1.txt")).unwrap(), b"one");
    assert_eq!(std::fs::read(work.path().join("3.txt")).unwrap(), b"three");
    assert_eq!(
        std::fs::read(work.path().join("2.txt")).unwrap(),
        b"not encrypted"
    );
}

#[tokio::test]
async fn bad_key_fails_before_touching_files() {
    let work = TempDir::new().unwrap();
    let backups = TempDir::new().unwrap();
    let rotate = RotateOnWrite::new(backups.path());
    write_files(work.path(), &[("a.txt", b"alpha")]);

    let result = encrypt_dir(
        work.path(),
        &rotate,
        "batchtest1notakey",
        PUBLIC_PREFIX,
        &BatchOptions::default(),
        None,
    )
    .await;

    assert!(result.is_err());
    assert_eq!(std::fs::read(work.path().join("a.txt")).unwrap(), b"alpha");
}

#[tokio::test]
async fn url_encoding_and_backup_pruning() {
    let work = TempDir::new().unwrap();
    let backups = TempDir::new().unwrap();
    let rotate = RotateOnWrite::new(backups.path());
    let (public, private) = keys();
    write_files(work.path(), &[("doc", b"contents")]);

    let options = BatchOptions {
        encoding: TransportEncoding::Url,
        keep_backups: Some(1),
        ..BatchOptions::default()
    };

    encrypt_dir(work.path(), &rotate, &public, PUBLIC_PREFIX, &options, None)
        .await
        .unwrap();
    decrypt_dir(work.path(), &rotate, &private, PRIVATE_PREFIX, &options, None)
        .await
        .unwrap();

    assert_eq!(std::fs::read(work.path().join("doc")).unwrap(), b"contents");
    assert_eq!(backup_count(backups.path()), 1);
}

#[tokio::test]
async fn progress_reports_every_attempted_file() {
    let work = TempDir::new().unwrap();
    let backups = TempDir::new().unwrap();
    let rotate = RotateOnWrite::new(backups.path());
    let (public, _) = keys();
    write_files(work.path(), &[("x", b"1"), ("y", b"2"), ("z", b"3")]);

    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let progress: ProgressFn = Box::new(move |done, total, _path| {
        assert_eq!(total, 3);
        assert!(done <= total);
        seen.fetch_add(1, Ordering::SeqCst);
    });

    encrypt_dir(
        work.path(),
        &rotate,
        &public,
        PUBLIC_PREFIX,
        &BatchOptions::default(),
        Some(&progress),
    )
    .await
    .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 3);
}
