//! Header assembly and verification
//!
//! ```text
//! [11 bytes: "agewrap/v1\n"][2 bytes BE: stanza count][stanzas...][32 bytes: HMAC-SHA256]
//! ```
//!
//! The tag covers every header byte before it and is keyed by
//! `HKDF(ikm=file_key, salt="", label="header")`. A stanza that unwraps
//! correctly proves nothing about the rest of the recipient list; only the
//! tag does, so it is always checked before the payload is touched.

use std::io::Read;

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::kdf::hkdf;
use crate::keys::FileKey;
use crate::scrypt::SCRYPT_STANZA_TAG;
use crate::stanza::{read_exact, read_u16, Stanza};
use crate::{Error, Result, MAC_SIZE};

type HmacSha256 = Hmac<Sha256>;

/// Format identifier at the start of every container.
pub const MAGIC: &[u8] = b"agewrap/v1\n";

const HEADER_LABEL: &[u8] = b"header";

/// Ordered stanzas plus the tag binding them to the file key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    stanzas: Vec<Stanza>,
    mac: [u8; MAC_SIZE],
}

impl Header {
    /// Compute the header tag over `stanzas` in their given order.
    ///
    /// A passphrase stanza must be the only stanza in the header.
    pub fn assemble(file_key: &FileKey, stanzas: Vec<Stanza>) -> Result<Self> {
        if stanzas.is_empty() {
            return Err(Error::InvalidRecipients("a header needs at least one stanza"));
        }
        if stanzas.len() > u16::MAX as usize {
            return Err(Error::InvalidRecipients("too many recipients"));
        }
        if stanzas.len() > 1 && stanzas.iter().any(|s| s.tag() == SCRYPT_STANZA_TAG) {
            return Err(Error::InvalidRecipients(
                "a passphrase stanza cannot be combined with other stanzas",
            ));
        }

        let mut hmac = header_hmac(file_key)?;
        hmac.update(&encode_unauthenticated(&stanzas));
        let mut mac = [0u8; MAC_SIZE];
        mac.copy_from_slice(&hmac.finalize().into_bytes());

        Ok(Self { stanzas, mac })
    }

    /// Recompute the tag and compare in constant time.
    pub fn verify(&self, file_key: &FileKey) -> Result<()> {
        let mut hmac = header_hmac(file_key)?;
        hmac.update(&encode_unauthenticated(&self.stanzas));
        hmac.verify_slice(&self.mac)
            .map_err(|_| Error::AuthenticationFailure("header tag mismatch"))
    }

    pub fn stanzas(&self) -> &[Stanza] {
        &self.stanzas
    }

    pub fn mac(&self) -> &[u8; MAC_SIZE] {
        &self.mac
    }

    /// Whether this header was produced for a passphrase.
    pub fn is_scrypt(&self) -> bool {
        self.stanzas
            .iter()
            .any(|s| s.tag() == SCRYPT_STANZA_TAG)
    }

    /// Full wire encoding, tag included.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = encode_unauthenticated(&self.stanzas);
        out.extend_from_slice(&self.mac);
        out
    }

    /// Read a header from the front of a container, leaving `input`
    /// positioned at the first payload byte.
    pub fn read_from<R: Read>(input: &mut R) -> Result<Self> {
        let mut magic = [0u8; MAGIC.len()];
        read_exact(input, &mut magic)?;
        if magic != MAGIC {
            return Err(Error::MalformedHeader("unrecognized format identifier"));
        }

        let count = read_u16(input)? as usize;
        if count == 0 {
            return Err(Error::MalformedHeader("header carries no stanzas"));
        }

        let mut stanzas = Vec::with_capacity(count);
        for _ in 0..count {
            stanzas.push(Stanza::read_from(input)?);
        }

        let mut mac = [0u8; MAC_SIZE];
        read_exact(input, &mut mac)?;

        Ok(Self { stanzas, mac })
    }
}

fn header_hmac(file_key: &FileKey) -> Result<HmacSha256> {
    let key = hkdf(&[], HEADER_LABEL, file_key.as_bytes())?;
    HmacSha256::new_from_slice(&key[..])
        .map_err(|e| Error::DerivationFailure(format!("HMAC key setup failed: {e}")))
}

fn encode_unauthenticated(stanzas: &[Stanza]) -> Vec<u8> {
    let mut out = Vec::with_capacity(MAGIC.len() + 2 + stanzas.len() * 64);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&(stanzas.len() as u16).to_be_bytes());
    for stanza in stanzas {
        stanza.write_to(&mut out);
    }
    out
}
