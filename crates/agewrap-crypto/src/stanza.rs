//! Recipient stanzas and their canonical wire encoding
//!
//! ```text
//! [1 byte: type length][type, ASCII]
//! [1 byte: arg count]  ([2 bytes BE: arg length][arg, UTF-8])*
//! [4 bytes BE: body length][body]
//! ```
//!
//! Every field is length-prefixed, so a parsed stanza re-encodes to exactly
//! the bytes it was read from. The header tag relies on that.

use std::io::{self, Read};

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;

use crate::{Error, Result};

/// Largest stanza body accepted on either side.
pub const MAX_BODY_LEN: usize = 1 << 20;

/// Largest single stanza argument.
pub const MAX_ARG_LEN: usize = u16::MAX as usize;

/// One recipient's wrapped copy of the file key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stanza {
    tag: String,
    args: Vec<String>,
    body: Vec<u8>,
}

impl Stanza {
    /// Build a stanza, checking that it fits the wire encoding.
    pub fn new(tag: impl Into<String>, args: Vec<String>, body: Vec<u8>) -> Result<Self> {
        let tag = tag.into();
        if tag.is_empty() || tag.len() > u8::MAX as usize {
            return Err(Error::MalformedStanza("type tag must be 1-255 bytes"));
        }
        if !tag.bytes().all(|b| b.is_ascii_graphic()) {
            return Err(Error::MalformedStanza("type tag must be printable ASCII"));
        }
        if args.len() > u8::MAX as usize {
            return Err(Error::MalformedStanza("too many arguments"));
        }
        if args.iter().any(|a| a.len() > MAX_ARG_LEN) {
            return Err(Error::MalformedStanza("argument too long"));
        }
        if body.len() > MAX_BODY_LEN {
            return Err(Error::MalformedStanza("body too long"));
        }
        Ok(Self { tag, args, body })
    }

    /// The wrapping scheme this stanza belongs to.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Append the canonical encoding to `out`.
    pub(crate) fn write_to(&self, out: &mut Vec<u8>) {
        // Lengths were bounded in `new`/`read_from`, the casts cannot truncate.
        out.push(self.tag.len() as u8);
        out.extend_from_slice(self.tag.as_bytes());
        out.push(self.args.len() as u8);
        for arg in &self.args {
            out.extend_from_slice(&(arg.len() as u16).to_be_bytes());
            out.extend_from_slice(arg.as_bytes());
        }
        out.extend_from_slice(&(self.body.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.body);
    }

    /// Read one stanza from a header stream.
    pub(crate) fn read_from<R: Read>(input: &mut R) -> Result<Self> {
        let tag_len = read_u8(input)? as usize;
        let tag = String::from_utf8(read_vec(input, tag_len)?)
            .map_err(|_| Error::MalformedHeader("stanza type is not UTF-8"))?;

        let arg_count = read_u8(input)? as usize;
        let mut args = Vec::with_capacity(arg_count);
        for _ in 0..arg_count {
            let len = read_u16(input)? as usize;
            let arg = String::from_utf8(read_vec(input, len)?)
                .map_err(|_| Error::MalformedHeader("stanza argument is not UTF-8"))?;
            args.push(arg);
        }

        let body_len = read_u32(input)? as usize;
        if body_len > MAX_BODY_LEN {
            return Err(Error::MalformedHeader("stanza body exceeds size limit"));
        }
        let body = read_vec(input, body_len)?;

        Self::new(tag, args, body).map_err(|_| Error::MalformedHeader("invalid stanza"))
    }
}

/// Encode binary stanza arguments (salts, ephemeral shares).
pub fn encode_arg(bytes: &[u8]) -> String {
    STANDARD_NO_PAD.encode(bytes)
}

/// Decode a binary stanza argument.
pub fn decode_arg(arg: &str) -> Result<Vec<u8>> {
    STANDARD_NO_PAD
        .decode(arg)
        .map_err(|_| Error::MalformedStanza("argument is not valid unpadded base64"))
}

pub(crate) fn read_exact<R: Read>(input: &mut R, buf: &mut [u8]) -> Result<()> {
    input.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => Error::MalformedHeader("header is truncated"),
        _ => Error::from(e),
    })
}

fn read_u8<R: Read>(input: &mut R) -> Result<u8> {
    let mut buf = [0u8; 1];
    read_exact(input, &mut buf)?;
    Ok(buf[0])
}

pub(crate) fn read_u16<R: Read>(input: &mut R) -> Result<u16> {
    let mut buf = [0u8; 2];
    read_exact(input, &mut buf)?;
    Ok(u16::from_be_bytes(buf))
}

fn read_u32<R: Read>(input: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    read_exact(input, &mut buf)?;
    Ok(u32::from_be_bytes(buf))
}

fn read_vec<R: Read>(input: &mut R, len: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    read_exact(input, &mut buf)?;
    Ok(buf)
}
