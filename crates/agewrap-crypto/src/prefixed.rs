//! One-call helpers over the envelope for string-encoded keys.
//!
//! Keys travel as bech32 strings under caller-chosen prefixes; containers
//! can additionally be base64-encoded for text-only channels. All helpers
//! draw randomness from the operating system.

use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use secrecy::{ExposeSecret, SecretString};

use crate::encoding::TransportEncoding;
use crate::envelope::{decrypt, encrypt};
use crate::recipient::{Identity, Recipient};
use crate::scrypt::{ScryptIdentity, ScryptRecipient};
use crate::x25519;
use crate::Result;

/// Generate an X25519 key pair and encode it.
///
/// Returns `(public, private)`: the public key lowercase under
/// `public_prefix`, the private key uppercase under `private_prefix`.
pub fn generate_key_pair<R: RngCore + CryptoRng>(
    public_prefix: &str,
    private_prefix: &str,
    rng: &mut R,
) -> Result<(String, SecretString)> {
    let identity = x25519::Identity::generate(rng)?;
    let public = identity.to_public().to_prefixed_string(public_prefix)?;
    let private = identity.to_prefixed_string(private_prefix)?;
    tracing::debug!(public_prefix, "generated key pair");
    Ok((public, private))
}

/// Encrypt for a single bech32 public key.
pub fn encrypt_with_prefix(plaintext: &[u8], public_key: &str, prefix: &str) -> Result<Vec<u8>> {
    let recipient = x25519::Recipient::from_prefixed_str(public_key, prefix)?;
    encrypt(&[Recipient::from(recipient)], plaintext, &mut OsRng)
}

/// Decrypt with a single bech32 private key.
pub fn decrypt_with_prefix(
    container: &[u8],
    private_key: &SecretString,
    prefix: &str,
) -> Result<Vec<u8>> {
    let identity = x25519::Identity::from_prefixed_str(private_key.expose_secret(), prefix)?;
    decrypt(&[Identity::from(identity)], container)
}

/// [`encrypt_with_prefix`], then transport-encode the container.
pub fn encrypt_to_transport(
    plaintext: &[u8],
    public_key: &str,
    prefix: &str,
    encoding: TransportEncoding,
) -> Result<String> {
    let container = encrypt_with_prefix(plaintext, public_key, prefix)?;
    Ok(encoding.encode(&container))
}

/// Transport-decode `text` (ignoring surrounding whitespace), then
/// [`decrypt_with_prefix`].
pub fn decrypt_from_transport(
    text: &str,
    private_key: &SecretString,
    prefix: &str,
    encoding: TransportEncoding,
) -> Result<Vec<u8>> {
    let container = encoding.decode(text.trim())?;
    decrypt_with_prefix(&container, private_key, prefix)
}

/// Encrypt under a passphrase with work factor `log2(N)`.
pub fn encrypt_with_passphrase(
    plaintext: &[u8],
    passphrase: SecretString,
    work_factor: u8,
) -> Result<Vec<u8>> {
    let mut recipient = ScryptRecipient::new(passphrase);
    recipient.set_work_factor(work_factor)?;
    encrypt(&[Recipient::from(recipient)], plaintext, &mut OsRng)
}

/// Decrypt a passphrase container, refusing work factors above `max_work_factor`.
pub fn decrypt_with_passphrase(
    container: &[u8],
    passphrase: SecretString,
    max_work_factor: u8,
) -> Result<Vec<u8>> {
    let identity = ScryptIdentity::new(passphrase).with_max_work_factor(max_work_factor);
    decrypt(&[Identity::from(identity)], container)
}
