//! Passphrase recipients
//!
//! Stanza: type `scrypt`, args `[base64(salt), decimal work factor]`, body
//! the file key sealed under
//! `scrypt(passphrase, "agewrap/v1/scrypt" || salt, N = 2^work_factor)`.
//!
//! The work factor arrives from the (unauthenticated) header, so the
//! decrypting side enforces a ceiling before doing any derivation work.

use rand::{CryptoRng, RngCore};
use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroizing;

use crate::kdf;
use crate::keys::{fill_random, unwrap_key, wrap_key, FileKey, WRAPPED_KEY_SIZE};
use crate::stanza::{decode_arg, encode_arg, Stanza};
use crate::{Error, Result};

/// Stanza type produced and recognized by this scheme.
pub const SCRYPT_STANZA_TAG: &str = "scrypt";

pub const SCRYPT_SALT_SIZE: usize = 16;

/// Work factor used for new stanzas unless configured otherwise.
pub const DEFAULT_WORK_FACTOR: u8 = 18;

/// Largest work factor accepted when decrypting unless configured otherwise.
pub const DEFAULT_MAX_WORK_FACTOR: u8 = 22;

/// Hard upper bound on any work factor, on either side. Derivation
/// additionally refuses anything over [`kdf::SCRYPT_MAX_MEMORY`].
pub const MAX_SUPPORTED_WORK_FACTOR: u8 = 30;

const SALT_LABEL: &[u8] = b"agewrap/v1/scrypt";

/// Wraps a file key under a passphrase. Must be the only recipient of a message.
pub struct ScryptRecipient {
    passphrase: SecretString,
    work_factor: u8,
}

impl ScryptRecipient {
    pub fn new(passphrase: SecretString) -> Self {
        Self {
            passphrase,
            work_factor: DEFAULT_WORK_FACTOR,
        }
    }

    /// Set `log2(N)` for new stanzas. Valid range is `1..=30`.
    pub fn set_work_factor(&mut self, log_n: u8) -> Result<()> {
        if log_n == 0 || log_n > MAX_SUPPORTED_WORK_FACTOR {
            return Err(Error::DerivationFailure(format!(
                "work factor {log_n} outside 1..={MAX_SUPPORTED_WORK_FACTOR}"
            )));
        }
        self.work_factor = log_n;
        Ok(())
    }

    pub fn work_factor(&self) -> u8 {
        self.work_factor
    }

    pub fn wrap_file_key<R: RngCore + CryptoRng>(
        &self,
        file_key: &FileKey,
        rng: &mut R,
    ) -> Result<Stanza> {
        let mut salt = [0u8; SCRYPT_SALT_SIZE];
        fill_random(rng, &mut salt)?;

        let wrapping_key = derive(&self.passphrase, &salt, self.work_factor)?;
        let body = wrap_key(&wrapping_key, file_key)?;

        tracing::debug!(work_factor = self.work_factor, "wrapped file key under passphrase");
        Stanza::new(
            SCRYPT_STANZA_TAG,
            vec![encode_arg(&salt), self.work_factor.to_string()],
            body,
        )
    }
}

impl std::fmt::Debug for ScryptRecipient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScryptRecipient")
            .field("work_factor", &self.work_factor)
            .finish_non_exhaustive()
    }
}

/// Unwraps scrypt stanzas with a passphrase, refusing work factors above
/// its ceiling.
pub struct ScryptIdentity {
    passphrase: SecretString,
    max_work_factor: u8,
}

impl ScryptIdentity {
    pub fn new(passphrase: SecretString) -> Self {
        Self {
            passphrase,
            max_work_factor: DEFAULT_MAX_WORK_FACTOR,
        }
    }

    /// Raise or lower the decrypt ceiling, capped at 30.
    pub fn with_max_work_factor(mut self, log_n: u8) -> Self {
        self.max_work_factor = log_n.min(MAX_SUPPORTED_WORK_FACTOR);
        self
    }

    pub fn max_work_factor(&self) -> u8 {
        self.max_work_factor
    }

    /// `None` means the stanza belongs to another scheme.
    pub fn unwrap_stanza(&self, stanza: &Stanza) -> Option<Result<FileKey>> {
        if stanza.tag() != SCRYPT_STANZA_TAG {
            return None;
        }
        Some(self.unwrap_matching(stanza))
    }

    fn unwrap_matching(&self, stanza: &Stanza) -> Result<FileKey> {
        let [salt, work_factor] = stanza.args() else {
            return Err(Error::MalformedStanza("scrypt stanza needs exactly two arguments"));
        };
        let salt = decode_arg(salt)?;
        if salt.len() != SCRYPT_SALT_SIZE {
            return Err(Error::MalformedStanza("scrypt salt must be 16 bytes"));
        }
        let log_n = parse_work_factor(work_factor, self.max_work_factor)?;
        if stanza.body().len() != WRAPPED_KEY_SIZE {
            return Err(Error::MalformedStanza("wrapped file key has the wrong length"));
        }

        tracing::debug!(work_factor = log_n, "deriving passphrase key");
        let wrapping_key = derive(&self.passphrase, &salt, log_n)?;
        unwrap_key(&wrapping_key, stanza.body())
    }
}

impl std::fmt::Debug for ScryptIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScryptIdentity")
            .field("max_work_factor", &self.max_work_factor)
            .finish_non_exhaustive()
    }
}

/// Parse a canonical decimal work factor: digits only, no leading zero,
/// nonzero, at most `ceiling`.
fn parse_work_factor(arg: &str, ceiling: u8) -> Result<u8> {
    if arg.is_empty() || arg.len() > 3 || !arg.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::MalformedStanza("work factor is not a decimal integer"));
    }
    if arg.starts_with('0') {
        return Err(Error::MalformedStanza("work factor is not canonical"));
    }
    let log_n: u16 = arg
        .parse()
        .map_err(|_| Error::MalformedStanza("work factor is not a decimal integer"))?;
    if log_n > u16::from(ceiling) {
        return Err(Error::MalformedStanza("work factor exceeds the configured ceiling"));
    }
    // ceiling <= 30, so this fits
    Ok(log_n as u8)
}

fn derive(passphrase: &SecretString, salt: &[u8], log_n: u8) -> Result<Zeroizing<[u8; 32]>> {
    let mut labeled = Zeroizing::new(Vec::with_capacity(SALT_LABEL.len() + salt.len()));
    labeled.extend_from_slice(SALT_LABEL);
    labeled.extend_from_slice(salt);
    kdf::scrypt(passphrase.expose_secret().as_bytes(), &labeled, log_n)
}
