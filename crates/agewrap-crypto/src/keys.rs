//! File key generation, the randomness capability, and file key wrapping

use rand::{CryptoRng, RngCore};
use zeroize::Zeroize;

use crate::aead::{open, seal};
use crate::{Error, Result, FILE_KEY_SIZE, KEY_SIZE, NONCE_SIZE, TAG_SIZE};

/// Size of a wrapped file key: sealed 16-byte key plus Poly1305 tag.
pub const WRAPPED_KEY_SIZE: usize = FILE_KEY_SIZE + TAG_SIZE;

/// The per-message 128-bit key. Zeroized on drop.
pub struct FileKey {
    bytes: [u8; FILE_KEY_SIZE],
}

impl FileKey {
    pub fn from_bytes(bytes: [u8; FILE_KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; FILE_KEY_SIZE] {
        &self.bytes
    }

    /// Draw a fresh file key from `rng`.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Result<Self> {
        let mut bytes = [0u8; FILE_KEY_SIZE];
        fill_random(rng, &mut bytes)?;
        let key = Self::from_bytes(bytes);
        bytes.zeroize();
        Ok(key)
    }
}

impl Drop for FileKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for FileKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Fill `buf` from `rng`, surfacing exhaustion as `RandomSourceFailure`.
pub fn fill_random<R: RngCore + CryptoRng>(rng: &mut R, buf: &mut [u8]) -> Result<()> {
    rng.try_fill_bytes(buf)
        .map_err(|e| Error::RandomSourceFailure(e.to_string()))
}

/// Seal a file key under a single-use wrapping key.
///
/// The wrapping key is derived fresh for every stanza, so the all-zero
/// nonce is never reused with the same key.
pub fn wrap_key(wrapping_key: &[u8; KEY_SIZE], file_key: &FileKey) -> Result<Vec<u8>> {
    seal(wrapping_key, &[0u8; NONCE_SIZE], file_key.as_bytes())
}

/// Open a stanza body produced by [`wrap_key`].
pub fn unwrap_key(wrapping_key: &[u8; KEY_SIZE], wrapped: &[u8]) -> Result<FileKey> {
    if wrapped.len() != WRAPPED_KEY_SIZE {
        return Err(Error::MalformedStanza("wrapped file key has the wrong length"));
    }

    let plaintext = open(wrapping_key, &[0u8; NONCE_SIZE], wrapped)?;
    let mut bytes = [0u8; FILE_KEY_SIZE];
    bytes.copy_from_slice(&plaintext);
    let key = FileKey::from_bytes(bytes);
    bytes.zeroize();
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::{OsRng, StdRng};
    use rand::SeedableRng;

    /// An RNG whose source has run dry.
    struct ExhaustedRng;

    impl RngCore for ExhaustedRng {
        fn next_u32(&mut self) -> u32 {
            0
        }
        fn next_u64(&mut self) -> u64 {
            0
        }
        fn fill_bytes(&mut self, _dest: &mut [u8]) {}
        fn try_fill_bytes(&mut self, _dest: &mut [u8]) -> std::result::Result<(), rand::Error> {
            Err(rand::Error::new(std::io::Error::other("entropy pool empty")))
        }
    }

    impl CryptoRng for ExhaustedRng {}

    #[test]
    fn test_file_key_generation() {
        let k1 = FileKey::generate(&mut OsRng).unwrap();
        let k2 = FileKey::generate(&mut OsRng).unwrap();
        assert_ne!(k1.as_bytes(), k2.as_bytes(), "random keys must differ");
    }

    #[test]
    fn test_file_key_deterministic_source() {
        let k1 = FileKey::generate(&mut StdRng::seed_from_u64(9)).unwrap();
        let k2 = FileKey::generate(&mut StdRng::seed_from_u64(9)).unwrap();
        assert_eq!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn test_exhausted_random_source() {
        let result = FileKey::generate(&mut ExhaustedRng);
        assert!(matches!(result, Err(Error::RandomSourceFailure(_))));
    }

    #[test]
    fn test_debug_is_redacted() {
        let key = FileKey::from_bytes([0xAB; FILE_KEY_SIZE]);
        let rendered = format!("{key:?}");
        assert!(rendered.contains("REDACTED"));
        assert!(!rendered.contains("171"));
    }

    #[test]
    fn test_key_wrap_unwrap_roundtrip() {
        let wrapping_key = [42u8; KEY_SIZE];
        let file_key = FileKey::generate(&mut OsRng).unwrap();

        let wrapped = wrap_key(&wrapping_key, &file_key).unwrap();
        assert_eq!(wrapped.len(), WRAPPED_KEY_SIZE);

        let unwrapped = unwrap_key(&wrapping_key, &wrapped).unwrap();
        assert_eq!(file_key.as_bytes(), unwrapped.as_bytes());
    }

    #[test]
    fn test_key_unwrap_wrong_key() {
        let file_key = FileKey::generate(&mut OsRng).unwrap();
        let wrapped = wrap_key(&[1u8; KEY_SIZE], &file_key).unwrap();

        let result = unwrap_key(&[2u8; KEY_SIZE], &wrapped);
        assert!(matches!(result, Err(Error::AuthenticationFailure(_))));
    }

    #[test]
    fn test_key_unwrap_wrong_length() {
        let result = unwrap_key(&[1u8; KEY_SIZE], &[0u8; WRAPPED_KEY_SIZE - 1]);
        assert!(matches!(result, Err(Error::MalformedStanza(_))));
    }
}
