//! Recipient and identity dispatch over the supported wrapping schemes

use rand::{CryptoRng, RngCore};

use crate::keys::FileKey;
use crate::scrypt::{ScryptIdentity, ScryptRecipient, SCRYPT_STANZA_TAG};
use crate::stanza::Stanza;
use crate::x25519;
use crate::{Error, Result};

/// Someone a file key can be wrapped for.
#[derive(Debug)]
pub enum Recipient {
    X25519(x25519::Recipient),
    Scrypt(ScryptRecipient),
}

impl Recipient {
    pub fn wrap_file_key<R: RngCore + CryptoRng>(
        &self,
        file_key: &FileKey,
        rng: &mut R,
    ) -> Result<Stanza> {
        match self {
            Recipient::X25519(r) => r.wrap_file_key(file_key, rng),
            Recipient::Scrypt(r) => r.wrap_file_key(file_key, rng),
        }
    }

    pub fn is_scrypt(&self) -> bool {
        matches!(self, Recipient::Scrypt(_))
    }
}

impl From<x25519::Recipient> for Recipient {
    fn from(r: x25519::Recipient) -> Self {
        Recipient::X25519(r)
    }
}

impl From<ScryptRecipient> for Recipient {
    fn from(r: ScryptRecipient) -> Self {
        Recipient::Scrypt(r)
    }
}

/// Something that can recover a file key from a stanza.
#[derive(Debug)]
pub enum Identity {
    X25519(x25519::Identity),
    Scrypt(ScryptIdentity),
}

impl Identity {
    /// `None` when the stanza's scheme is not this identity's.
    pub fn unwrap_stanza(&self, stanza: &Stanza) -> Option<Result<FileKey>> {
        match self {
            Identity::X25519(i) => i.unwrap_stanza(stanza),
            Identity::Scrypt(i) => i.unwrap_stanza(stanza),
        }
    }

    /// Try every stanza in header order.
    ///
    /// Skippable failures are remembered and the search continues; the last
    /// one is returned if nothing opens. `None` means no stanza was even of
    /// this identity's scheme.
    pub fn unwrap_stanzas(&self, stanzas: &[Stanza]) -> Option<Result<FileKey>> {
        if let Identity::Scrypt(_) = self {
            let scrypt_count = stanzas.iter().filter(|s| s.tag() == SCRYPT_STANZA_TAG).count();
            if scrypt_count > 0 && stanzas.len() != 1 {
                return Some(Err(Error::MalformedHeader(
                    "a passphrase stanza must be the only stanza",
                )));
            }
        }

        let mut last_error = None;
        for stanza in stanzas {
            match self.unwrap_stanza(stanza) {
                None => continue,
                Some(Ok(file_key)) => return Some(Ok(file_key)),
                Some(Err(e)) if e.is_skippable() => last_error = Some(e),
                Some(Err(e)) => return Some(Err(e)),
            }
        }
        last_error.map(Err)
    }
}

impl From<x25519::Identity> for Identity {
    fn from(i: x25519::Identity) -> Self {
        Identity::X25519(i)
    }
}

impl From<ScryptIdentity> for Identity {
    fn from(i: ScryptIdentity) -> Self {
        Identity::Scrypt(i)
    }
}
