//! agewrap-files: safe on-disk replacement and per-directory batches
//!
//! Every write goes through [`RotateOnWrite`]: the new content lands in a
//! synced temp sibling, the previous version is copied into the backup
//! directory, then the temp file is renamed over the destination. A failure
//! at any step leaves the destination as it was.

pub mod batch;
pub mod rotate;

pub use batch::{decrypt_dir, encrypt_dir, BatchFailure, BatchOptions, BatchReport, ProgressFn};
pub use rotate::RotateOnWrite;
