//! Container encryption and decryption
//!
//! Encryption: file key → one stanza per recipient → header + tag →
//! payload nonce → stream key → chunks. Decryption runs the same steps in
//! reverse and refuses to release plaintext until the header tag checks out.

use std::io::{self, Read, Write};

use rand::{CryptoRng, RngCore};

use crate::header::Header;
use crate::keys::{fill_random, FileKey};
use crate::recipient::{Identity, Recipient};
use crate::stream::{stream_key, StreamReader, StreamWriter, PAYLOAD_NONCE_SIZE};
use crate::{Error, Result};

/// Encrypts containers for a fixed recipient list.
#[derive(Debug)]
pub struct Encryptor<'a> {
    recipients: &'a [Recipient],
}

impl<'a> Encryptor<'a> {
    /// Reject recipient lists that cannot form a valid header: an empty
    /// list, or a passphrase recipient alongside anything else.
    pub fn new(recipients: &'a [Recipient]) -> Result<Self> {
        if recipients.is_empty() {
            return Err(Error::InvalidRecipients("at least one recipient is required"));
        }
        if recipients.len() > 1 && recipients.iter().any(Recipient::is_scrypt) {
            return Err(Error::InvalidRecipients(
                "a passphrase recipient cannot be combined with other recipients",
            ));
        }
        Ok(Self { recipients })
    }

    /// Write the header and payload nonce to `output` and return a writer
    /// for the plaintext. Call [`StreamWriter::finish`] when done.
    pub fn wrap_output<W: Write, R: RngCore + CryptoRng>(
        &self,
        mut output: W,
        rng: &mut R,
    ) -> Result<StreamWriter<W>> {
        let file_key = FileKey::generate(rng)?;

        let stanzas = self
            .recipients
            .iter()
            .map(|r| r.wrap_file_key(&file_key, &mut *rng))
            .collect::<Result<Vec<_>>>()?;
        let header = Header::assemble(&file_key, stanzas)?;
        output.write_all(&header.to_bytes())?;

        let mut nonce = [0u8; PAYLOAD_NONCE_SIZE];
        fill_random(rng, &mut nonce)?;
        output.write_all(&nonce)?;

        let key = stream_key(&file_key, &nonce, header.mac())?;
        tracing::debug!(recipients = self.recipients.len(), "header written, streaming payload");
        Ok(StreamWriter::new(output, key))
    }
}

/// Parses a container header and, given a matching identity, yields the
/// plaintext as a reader.
#[derive(Debug)]
pub struct Decryptor<R: Read> {
    input: R,
    header: Header,
}

impl<R: Read> Decryptor<R> {
    /// Read the header from the front of `input`.
    pub fn new(mut input: R) -> Result<Self> {
        let header = Header::read_from(&mut input)?;
        tracing::debug!(stanzas = header.stanzas().len(), "parsed header");
        Ok(Self { input, header })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Whether the container is passphrase-encrypted.
    pub fn is_scrypt(&self) -> bool {
        self.header.is_scrypt()
    }

    /// Recover the file key with the first identity that opens a stanza,
    /// verify the header tag, and return a reader over the plaintext.
    pub fn decrypt(mut self, identities: &[Identity]) -> Result<StreamReader<R>> {
        let file_key = self.unwrap_file_key(identities)?;
        self.header.verify(&file_key)?;

        let mut nonce = [0u8; PAYLOAD_NONCE_SIZE];
        self.input.read_exact(&mut nonce).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => {
                Error::ChunkOrderingViolation("payload nonce is missing")
            }
            _ => Error::from(e),
        })?;

        let key = stream_key(&file_key, &nonce, self.header.mac())?;
        tracing::debug!("header verified, streaming payload");
        Ok(StreamReader::new(self.input, key))
    }

    fn unwrap_file_key(&self, identities: &[Identity]) -> Result<FileKey> {
        let mut last_error = None;
        for identity in identities {
            match identity.unwrap_stanzas(self.header.stanzas()) {
                None => continue,
                Some(Ok(file_key)) => return Ok(file_key),
                Some(Err(e)) if e.is_skippable() => last_error = Some(e),
                Some(Err(e)) => return Err(e),
            }
        }
        Err(last_error.unwrap_or(Error::NoMatch))
    }
}

/// Encrypt `plaintext` for `recipients` into a complete container.
pub fn encrypt<R: RngCore + CryptoRng>(
    recipients: &[Recipient],
    plaintext: &[u8],
    rng: &mut R,
) -> Result<Vec<u8>> {
    let mut writer = Encryptor::new(recipients)?.wrap_output(Vec::new(), rng)?;
    writer.write_all(plaintext)?;
    writer.finish()
}

/// Decrypt a complete container with the first matching identity.
pub fn decrypt(identities: &[Identity], container: &[u8]) -> Result<Vec<u8>> {
    let mut reader = Decryptor::new(container)?.decrypt(identities)?;
    let mut plaintext = Vec::new();
    reader.read_to_end(&mut plaintext)?;
    Ok(plaintext)
}
