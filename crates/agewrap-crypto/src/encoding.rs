//! Text encodings: bech32 key strings and base64 transport encoding

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use bech32::{FromBase32, ToBase32, Variant};
use zeroize::Zeroizing;

use crate::{Error, Result};

/// Encode raw key bytes as bech32 with `prefix` as the human-readable part.
///
/// The result is lowercase; callers uppercase private keys themselves.
pub fn encode_key(prefix: &str, bytes: &[u8]) -> Result<String> {
    if prefix.is_empty() {
        return Err(Error::InvalidPrefix("key prefix must not be empty"));
    }
    bech32::encode(&prefix.to_ascii_lowercase(), bytes.to_base32(), Variant::Bech32)
        .map_err(|_| Error::InvalidPrefix("key prefix is not a valid bech32 human-readable part"))
}

/// Decode a bech32 key string, requiring the human-readable part to equal
/// `prefix` (case-insensitively).
///
/// Error messages never include the input, which may be a private key.
pub fn decode_key(prefix: &str, encoded: &str) -> Result<Zeroizing<Vec<u8>>> {
    if prefix.is_empty() {
        return Err(Error::InvalidPrefix("key prefix must not be empty"));
    }

    let (hrp, data, variant) = bech32::decode(encoded.trim())
        .map_err(|_| Error::MalformedKey("key is not valid bech32"))?;
    if variant != Variant::Bech32 {
        return Err(Error::MalformedKey("key uses the wrong bech32 variant"));
    }
    if hrp != prefix.to_ascii_lowercase() {
        return Err(Error::MalformedKey("key has an unexpected prefix"));
    }

    Vec::<u8>::from_base32(&data)
        .map(Zeroizing::new)
        .map_err(|_| Error::MalformedKey("key payload is not valid base32"))
}

/// Byte-to-text encoding for carrying containers through text channels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransportEncoding {
    /// Standard alphabet, no padding.
    #[default]
    RawStd,
    Std,
    Url,
    RawUrl,
}

impl TransportEncoding {
    pub const ALL: [TransportEncoding; 4] = [Self::RawStd, Self::Std, Self::Url, Self::RawUrl];

    pub fn name(self) -> &'static str {
        match self {
            Self::RawStd => "raw-std",
            Self::Std => "std",
            Self::Url => "url",
            Self::RawUrl => "raw-url",
        }
    }

    pub fn encode(self, bytes: &[u8]) -> String {
        match self {
            Self::RawStd => STANDARD_NO_PAD.encode(bytes),
            Self::Std => STANDARD.encode(bytes),
            Self::Url => URL_SAFE.encode(bytes),
            Self::RawUrl => URL_SAFE_NO_PAD.encode(bytes),
        }
    }

    /// Decode, failing with `MalformedInput` on a bad alphabet or padding.
    pub fn decode(self, text: &str) -> Result<Vec<u8>> {
        let decoded = match self {
            Self::RawStd => STANDARD_NO_PAD.decode(text),
            Self::Std => STANDARD.decode(text),
            Self::Url => URL_SAFE.decode(text),
            Self::RawUrl => URL_SAFE_NO_PAD.decode(text),
        };
        decoded.map_err(|e| Error::MalformedInput(format!("{} decode failed: {e}", self.name())))
    }
}

impl fmt::Display for TransportEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TransportEncoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|e| e.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::MalformedInput(format!("unknown transport encoding: {s}")))
    }
}
