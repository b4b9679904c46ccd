//! X25519 recipients and identities
//!
//! Wrapping: a fresh ephemeral scalar per stanza, ECDH against the
//! recipient point, then
//! `HKDF(salt = ephemeral_share || recipient_point, label = "agewrap/v1/X25519")`
//! into a single-use wrapping key for the file key.

use rand::{CryptoRng, RngCore};
use secrecy::SecretString;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

use crate::encoding::{decode_key, encode_key};
use crate::kdf::hkdf;
use crate::keys::{fill_random, unwrap_key, wrap_key, FileKey};
use crate::stanza::{decode_arg, encode_arg, Stanza};
use crate::{Error, Result, KEY_SIZE};

/// Stanza type produced and recognized by this scheme.
pub const X25519_STANZA_TAG: &str = "X25519";

/// Human-readable part used for public keys when the caller has no preference.
pub const DEFAULT_PUBLIC_PREFIX: &str = "agewrap";

/// Human-readable part used for private keys when the caller has no preference.
pub const DEFAULT_PRIVATE_PREFIX: &str = "AGEWRAP-SECRET-KEY-";

const WRAP_LABEL: &[u8] = b"agewrap/v1/X25519";

/// A private scalar. Only ever leaves this type as an uppercase secret string.
pub struct Identity(StaticSecret);

impl Identity {
    /// Sample a new scalar from `rng`.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Result<Self> {
        let mut bytes = Zeroizing::new([0u8; KEY_SIZE]);
        fill_random(rng, &mut bytes[..])?;
        Ok(Self(StaticSecret::from(*bytes)))
    }

    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(StaticSecret::from(bytes))
    }

    pub fn to_public(&self) -> Recipient {
        Recipient(PublicKey::from(&self.0))
    }

    /// Encode as an uppercase bech32 string under `prefix`.
    pub fn to_prefixed_string(&self, prefix: &str) -> Result<SecretString> {
        let bytes = Zeroizing::new(self.0.to_bytes());
        let encoded = Zeroizing::new(encode_key(prefix, &bytes[..])?);
        Ok(SecretString::from(encoded.to_ascii_uppercase()))
    }

    /// Parse a private key string produced by [`Identity::to_prefixed_string`].
    pub fn from_prefixed_str(encoded: &str, prefix: &str) -> Result<Self> {
        let bytes = decode_key(prefix, encoded)?;
        let scalar: [u8; KEY_SIZE] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| Error::MalformedKey("private key must be 32 bytes"))?;
        Ok(Self::from_bytes(scalar))
    }

    /// Recover the file key from an X25519 stanza.
    ///
    /// `None` means the stanza belongs to another scheme.
    pub fn unwrap_stanza(&self, stanza: &Stanza) -> Option<Result<FileKey>> {
        if stanza.tag() != X25519_STANZA_TAG {
            return None;
        }
        Some(self.unwrap_matching(stanza))
    }

    fn unwrap_matching(&self, stanza: &Stanza) -> Result<FileKey> {
        let [share] = stanza.args() else {
            return Err(Error::MalformedStanza("X25519 stanza needs exactly one argument"));
        };
        let share: [u8; KEY_SIZE] = decode_arg(share)?
            .try_into()
            .map_err(|_| Error::MalformedStanza("ephemeral share must be 32 bytes"))?;
        let ephemeral = PublicKey::from(share);

        let shared = self.0.diffie_hellman(&ephemeral);
        if !shared.was_contributory() {
            return Err(Error::MalformedStanza("ephemeral share is a low-order point"));
        }

        let recipient = PublicKey::from(&self.0);
        let wrapping_key = wrapping_key(&ephemeral, &recipient, shared.as_bytes())?;
        unwrap_key(&wrapping_key, stanza.body())
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Identity").field(&"[REDACTED]").finish()
    }
}

/// A recipient public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recipient(PublicKey);

impl Recipient {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(PublicKey::from(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        self.0.as_bytes()
    }

    /// Encode as a lowercase bech32 string under `prefix`.
    pub fn to_prefixed_string(&self, prefix: &str) -> Result<String> {
        encode_key(prefix, self.0.as_bytes())
    }

    pub fn from_prefixed_str(encoded: &str, prefix: &str) -> Result<Self> {
        let bytes = decode_key(prefix, encoded)?;
        let point: [u8; KEY_SIZE] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| Error::MalformedKey("public key must be 32 bytes"))?;
        Ok(Self::from_bytes(point))
    }

    /// Wrap `file_key` for this recipient under a fresh ephemeral key.
    pub fn wrap_file_key<R: RngCore + CryptoRng>(
        &self,
        file_key: &FileKey,
        rng: &mut R,
    ) -> Result<Stanza> {
        let mut scalar = Zeroizing::new([0u8; KEY_SIZE]);
        fill_random(rng, &mut scalar[..])?;
        let ephemeral_secret = StaticSecret::from(*scalar);
        let ephemeral = PublicKey::from(&ephemeral_secret);

        let shared = ephemeral_secret.diffie_hellman(&self.0);
        if !shared.was_contributory() {
            return Err(Error::InvalidRecipients("recipient key is a low-order point"));
        }

        let wrapping_key = wrapping_key(&ephemeral, &self.0, shared.as_bytes())?;
        let body = wrap_key(&wrapping_key, file_key)?;
        Stanza::new(X25519_STANZA_TAG, vec![encode_arg(ephemeral.as_bytes())], body)
    }
}

fn wrapping_key(
    ephemeral: &PublicKey,
    recipient: &PublicKey,
    shared: &[u8; KEY_SIZE],
) -> Result<Zeroizing<[u8; KEY_SIZE]>> {
    let mut salt = [0u8; 2 * KEY_SIZE];
    salt[..KEY_SIZE].copy_from_slice(ephemeral.as_bytes());
    salt[KEY_SIZE..].copy_from_slice(recipient.as_bytes());
    hkdf(&salt, WRAP_LABEL, shared)
}
