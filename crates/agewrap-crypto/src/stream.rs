//! Chunked payload encryption (STREAM construction)
//!
//! Payload format (binary):
//! ```text
//! [16 bytes: random payload nonce]
//! [chunk 0: ChaCha20-Poly1305(64 KiB plaintext) = 64 KiB + 16]
//! ...
//! [final chunk: 0..=64 KiB plaintext + 16, last-chunk flag set]
//! ```
//!
//! Chunk nonce = 11-byte big-endian counter || 1-byte last flag. The counter
//! binds each chunk to its position and the flag marks the end, so
//! reordering, duplication and truncation all fail authentication. The
//! final chunk is only empty when the whole payload is.

use std::io::{self, Read, Write};

use zeroize::Zeroizing;

use crate::aead::{open, seal};
use crate::kdf::hkdf;
use crate::keys::FileKey;
use crate::{Error, Result, KEY_SIZE, MAC_SIZE, NONCE_SIZE, TAG_SIZE};

/// Plaintext bytes per chunk
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Size of the random nonce that salts the stream key
pub const PAYLOAD_NONCE_SIZE: usize = 16;

const ENCRYPTED_CHUNK_SIZE: usize = CHUNK_SIZE + TAG_SIZE;

const PAYLOAD_LABEL: &[u8] = b"payload";

/// Where a payload stream is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Zero or more non-final chunks have been processed.
    Streaming,
    /// The final chunk has been produced or authenticated.
    Final,
    /// No further input or output is possible.
    Closed,
}

/// Derive the stream key from the file key, the payload nonce and the
/// header tag. Payload decryption is impossible without the exact header
/// the tag was computed over.
pub fn stream_key(
    file_key: &FileKey,
    nonce: &[u8; PAYLOAD_NONCE_SIZE],
    header_mac: &[u8; MAC_SIZE],
) -> Result<Zeroizing<[u8; KEY_SIZE]>> {
    let mut label = Vec::with_capacity(PAYLOAD_LABEL.len() + MAC_SIZE);
    label.extend_from_slice(PAYLOAD_LABEL);
    label.extend_from_slice(header_mac);
    hkdf(nonce, &label, file_key.as_bytes())
}

fn chunk_nonce(counter: u64, last: bool) -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    // 11-byte counter; a u64 fills its low 8 bytes
    nonce[3..11].copy_from_slice(&counter.to_be_bytes());
    nonce[11] = u8::from(last);
    nonce
}

fn next_counter(counter: u64) -> Result<u64> {
    counter
        .checked_add(1)
        .ok_or(Error::ChunkOrderingViolation("chunk counter overflow"))
}

/// Encrypts a payload written through [`Write`].
///
/// A full chunk is held back until more data arrives so that a payload
/// ending exactly on a chunk boundary still gets a final-flagged chunk.
/// Call [`StreamWriter::finish`] to emit the final chunk; dropping the
/// writer without it leaves a truncated payload that will not decrypt.
pub struct StreamWriter<W: Write> {
    inner: W,
    key: Zeroizing<[u8; KEY_SIZE]>,
    counter: u64,
    buf: Zeroizing<Vec<u8>>,
    state: StreamState,
}

impl<W: Write> StreamWriter<W> {
    pub(crate) fn new(inner: W, key: Zeroizing<[u8; KEY_SIZE]>) -> Self {
        Self {
            inner,
            key,
            counter: 0,
            buf: Zeroizing::new(Vec::with_capacity(CHUNK_SIZE)),
            state: StreamState::Streaming,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    fn seal_chunk(&mut self, last: bool) -> Result<()> {
        let sealed = seal(&self.key, &chunk_nonce(self.counter, last), &self.buf)?;
        self.inner.write_all(&sealed)?;
        self.buf.clear();
        self.counter = next_counter(self.counter)?;
        Ok(())
    }

    /// Emit the final chunk and return the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        if self.state != StreamState::Streaming {
            return Err(Error::ChunkOrderingViolation("stream already finished"));
        }
        self.seal_chunk(true)?;
        self.state = StreamState::Final;
        self.inner.flush()?;
        self.state = StreamState::Closed;
        tracing::debug!(chunks = self.counter, "payload stream closed");
        Ok(self.inner)
    }
}

impl<W: Write> Write for StreamWriter<W> {
    fn write(&mut self, mut data: &[u8]) -> io::Result<usize> {
        if self.state != StreamState::Streaming {
            return Err(Error::ChunkOrderingViolation("write after final chunk").into());
        }

        let written = data.len();
        while !data.is_empty() {
            if self.buf.len() == CHUNK_SIZE {
                self.seal_chunk(false)?;
            }
            let take = (CHUNK_SIZE - self.buf.len()).min(data.len());
            self.buf.extend_from_slice(&data[..take]);
            data = &data[take..];
        }
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Decrypts and authenticates a payload, one chunk at a time, through [`Read`].
///
/// Plaintext from a chunk is only released after that chunk's tag has been
/// verified. The stream cannot be resumed midway; restart from the header.
pub struct StreamReader<R: Read> {
    inner: R,
    key: Zeroizing<[u8; KEY_SIZE]>,
    counter: u64,
    /// One byte read past the current chunk, proving it is not the last.
    lookahead: Option<u8>,
    chunk: Zeroizing<Vec<u8>>,
    pos: usize,
    state: StreamState,
}

impl<R: Read> StreamReader<R> {
    pub(crate) fn new(inner: R, key: Zeroizing<[u8; KEY_SIZE]>) -> Self {
        Self {
            inner,
            key,
            counter: 0,
            lookahead: None,
            chunk: Zeroizing::new(Vec::new()),
            pos: 0,
            state: StreamState::Streaming,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Read up to one encrypted chunk plus a lookahead byte.
    fn fill_chunk(&mut self) -> Result<(Vec<u8>, bool)> {
        let mut ciphertext = Vec::with_capacity(ENCRYPTED_CHUNK_SIZE + 1);
        ciphertext.extend(self.lookahead.take());

        let mut limited = (&mut self.inner).take((ENCRYPTED_CHUNK_SIZE + 1 - ciphertext.len()) as u64);
        limited.read_to_end(&mut ciphertext)?;

        if ciphertext.len() > ENCRYPTED_CHUNK_SIZE {
            self.lookahead = ciphertext.pop();
            Ok((ciphertext, false))
        } else {
            Ok((ciphertext, true))
        }
    }

    fn next_chunk(&mut self) -> Result<()> {
        let (ciphertext, last) = self.fill_chunk()?;

        if ciphertext.is_empty() {
            return Err(Error::ChunkOrderingViolation("payload is missing its final chunk"));
        }
        if ciphertext.len() < TAG_SIZE {
            return Err(Error::ChunkOrderingViolation("final chunk is truncated"));
        }

        let plaintext = match open(&self.key, &chunk_nonce(self.counter, last), &ciphertext) {
            Ok(plaintext) => plaintext,
            Err(_) => return Err(self.classify_failure(&ciphertext, last)),
        };

        if last && plaintext.is_empty() && self.counter > 0 {
            return Err(Error::ChunkOrderingViolation("empty final chunk after data"));
        }

        self.chunk = plaintext;
        self.pos = 0;
        self.counter = next_counter(self.counter)?;
        if last {
            self.state = StreamState::Final;
        }
        Ok(())
    }

    /// Distinguish a misplaced final flag from plain forgery.
    fn classify_failure(&self, ciphertext: &[u8], last: bool) -> Error {
        let flipped = chunk_nonce(self.counter, !last);
        if open(&self.key, &flipped, ciphertext).is_ok() {
            if last {
                Error::ChunkOrderingViolation("payload truncated at a chunk boundary")
            } else {
                Error::ChunkOrderingViolation("data follows the final chunk")
            }
        } else {
            Error::AuthenticationFailure("payload chunk failed authentication")
        }
    }
}

impl<R: Read> Read for StreamReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            if self.pos < self.chunk.len() {
                let n = (self.chunk.len() - self.pos).min(buf.len());
                buf[..n].copy_from_slice(&self.chunk[self.pos..self.pos + n]);
                self.pos += n;
                return Ok(n);
            }

            match self.state {
                StreamState::Streaming => self.next_chunk()?,
                StreamState::Final | StreamState::Closed => {
                    self.state = StreamState::Closed;
                    return Ok(0);
                }
            }
        }
    }
}
