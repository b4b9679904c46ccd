use std::io;

use thiserror::Error;

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures surfaced by the envelope format.
///
/// Messages name the stage that failed and never carry key material or
/// passwords.
#[derive(Debug, Error)]
pub enum Error {
    /// The secure random source could not produce bytes. There is no fallback.
    #[error("random source failure: {0}")]
    RandomSourceFailure(String),

    /// A stanza's arguments or body could not be parsed for its type.
    #[error("malformed stanza: {0}")]
    MalformedStanza(&'static str),

    /// The container header is structurally invalid.
    #[error("malformed header: {0}")]
    MalformedHeader(&'static str),

    /// None of the supplied identities recognized any stanza in the header.
    #[error("no identity matched any recipient stanza")]
    NoMatch,

    /// A tag or AEAD verification did not match.
    #[error("authentication failed: {0}")]
    AuthenticationFailure(&'static str),

    /// Key derivation was rejected, usually because of the work factor.
    #[error("key derivation failed: {0}")]
    DerivationFailure(String),

    /// Payload chunks are missing, reordered, or follow the final chunk.
    #[error("payload chunk ordering violation: {0}")]
    ChunkOrderingViolation(&'static str),

    /// A key prefix was empty or not a valid human-readable part.
    #[error("invalid key prefix: {0}")]
    InvalidPrefix(&'static str),

    /// A prefixed key string did not decode to a key.
    #[error("malformed key: {0}")]
    MalformedKey(&'static str),

    /// A transport-encoded string had an invalid alphabet or padding.
    #[error("malformed transport encoding: {0}")]
    MalformedInput(String),

    /// The recipient list cannot be used to build a header.
    #[error("invalid recipients: {0}")]
    InvalidRecipients(&'static str),

    /// The AEAD refused to seal (plaintext too large).
    #[error("cipher failure: {0}")]
    CipherFailure(&'static str),

    #[error("I/O error: {0}")]
    Io(io::Error),
}

impl Error {
    /// Whether this error only means "this stanza was not for us".
    ///
    /// Used by the decryptor to keep trying the remaining stanzas.
    pub fn is_skippable(&self) -> bool {
        matches!(
            self,
            Error::MalformedStanza(_) | Error::AuthenticationFailure(_) | Error::NoMatch
        )
    }
}

// StreamReader/StreamWriter travel through `std::io`; recover our own error
// on the way back out instead of burying it inside `Error::Io`.
impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        if e.get_ref().is_none() {
            return Error::Io(e);
        }
        let kind = e.kind();
        match e.into_inner() {
            Some(inner) => match inner.downcast::<Error>() {
                Ok(err) => *err,
                Err(inner) => Error::Io(io::Error::new(kind, inner)),
            },
            None => Error::Io(kind.into()),
        }
    }
}

impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Io(inner) => inner,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}
