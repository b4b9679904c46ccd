//! ChaCha20-Poly1305 seal/open
//!
//! Shared by key wrapping (single-use derived key, all-zero nonce) and the
//! payload STREAM (nonce from chunk counter and last-chunk flag).

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use zeroize::Zeroizing;

use crate::{Error, Result, KEY_SIZE, NONCE_SIZE};

/// Encrypt `plaintext`, returning `ciphertext || tag`.
pub fn seal(key: &[u8; KEY_SIZE], nonce: &[u8; NONCE_SIZE], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(key.into());
    cipher
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|_| Error::CipherFailure("ChaCha20-Poly1305 seal failed"))
}

/// Decrypt `ciphertext || tag`. The plaintext is zeroized when dropped.
pub fn open(
    key: &[u8; KEY_SIZE],
    nonce: &[u8; NONCE_SIZE],
    ciphertext: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    let cipher = ChaCha20Poly1305::new(key.into());
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map(Zeroizing::new)
        .map_err(|_| Error::AuthenticationFailure("ChaCha20-Poly1305 tag mismatch"))
}
