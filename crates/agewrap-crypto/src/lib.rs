//! agewrap-crypto: a small age-style authenticated encryption envelope
//!
//! Container layout:
//! ```text
//! [header: magic | stanza count | stanzas | HMAC-SHA256 tag][payload: nonce | chunks]
//! ```
//!
//! Key hierarchy:
//! ```text
//! File Key (128-bit, random per message)
//!   ├── wrapped once per recipient into a stanza
//!   │     ├── X25519:  HKDF(ephemeral share || recipient, DH output) → ChaCha20-Poly1305
//!   │     └── scrypt:  scrypt(password, label || salt, 2^logN) → ChaCha20-Poly1305
//!   ├── Header Key (HKDF, label="header") → HMAC-SHA256 over the header
//!   └── Stream Key (HKDF, salt=payload nonce, label="payload" || header tag)
//!         └── 64 KiB chunks, nonce = 88-bit counter || last-chunk flag
//! ```

pub mod aead;
pub mod encoding;
pub mod envelope;
pub mod error;
pub mod header;
pub mod kdf;
pub mod keys;
pub mod prefixed;
pub mod recipient;
pub mod scrypt;
pub mod stanza;
pub mod stream;
pub mod x25519;

pub use encoding::{decode_key, encode_key, TransportEncoding};
pub use envelope::{decrypt, encrypt, Decryptor, Encryptor};
pub use error::{Error, Result};
pub use header::Header;
pub use keys::FileKey;
pub use prefixed::{
    decrypt_from_transport, decrypt_with_passphrase, decrypt_with_prefix, encrypt_to_transport,
    encrypt_with_passphrase, encrypt_with_prefix, generate_key_pair,
};
pub use recipient::{Identity, Recipient};
pub use scrypt::{ScryptIdentity, ScryptRecipient};
pub use stanza::Stanza;
pub use stream::{StreamReader, StreamState, StreamWriter, CHUNK_SIZE};

/// Size of a file key in bytes (128-bit)
pub const FILE_KEY_SIZE: usize = 16;

/// Size of a ChaCha20-Poly1305 key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of a ChaCha20-Poly1305 nonce (96-bit)
pub const NONCE_SIZE: usize = 12;

/// Size of a Poly1305 authentication tag
pub const TAG_SIZE: usize = 16;

/// Size of the HMAC-SHA256 header tag
pub const MAC_SIZE: usize = 32;
