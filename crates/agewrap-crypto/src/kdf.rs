//! Key derivation: HKDF-SHA256 for shared secrets, scrypt for passwords

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::{Error, Result, KEY_SIZE};

/// scrypt block size parameter
pub const SCRYPT_R: u32 = 8;

/// scrypt parallelization parameter
pub const SCRYPT_P: u32 = 1;

/// Largest scrypt working set (`128 * r * N` bytes) we will allocate.
/// With `r = 8` this admits work factors up to 22.
pub const SCRYPT_MAX_MEMORY: u64 = 4 << 30;

/// HKDF-SHA256 extract-and-expand into a 256-bit key.
///
/// Deterministic: the same salt, label and input keying material always
/// produce the same key, which is what lets the decrypting side recompute
/// a wrapping key.
pub fn hkdf(salt: &[u8], label: &[u8], ikm: &[u8]) -> Result<Zeroizing<[u8; KEY_SIZE]>> {
    let hkdf = Hkdf::<Sha256>::new(Some(salt), ikm);
    let mut okm = Zeroizing::new([0u8; KEY_SIZE]);
    hkdf.expand(label, &mut okm[..])
        .map_err(|e| Error::DerivationFailure(format!("HKDF expand failed: {e}")))?;
    Ok(okm)
}

/// scrypt with `N = 2^log_n`, `r = 8`, `p = 1` into a 256-bit key.
///
/// Parameter sets whose working set exceeds [`SCRYPT_MAX_MEMORY`] fail with
/// `DerivationFailure` before anything is allocated.
pub fn scrypt(password: &[u8], salt: &[u8], log_n: u8) -> Result<Zeroizing<[u8; KEY_SIZE]>> {
    match scrypt_memory(log_n) {
        Some(bytes) if bytes <= SCRYPT_MAX_MEMORY => {}
        _ => {
            return Err(Error::DerivationFailure(format!(
                "scrypt work factor {log_n} needs more than {SCRYPT_MAX_MEMORY} bytes"
            )))
        }
    }

    let params = ::scrypt::Params::new(log_n, SCRYPT_R, SCRYPT_P, KEY_SIZE).map_err(|e| {
        Error::DerivationFailure(format!("invalid scrypt parameters (log_n={log_n}): {e}"))
    })?;

    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    ::scrypt::scrypt(password, salt, &params, &mut key[..])
        .map_err(|e| Error::DerivationFailure(format!("scrypt failed: {e}")))?;
    Ok(key)
}

/// Bytes scrypt allocates for its `V` array, or `None` on overflow.
fn scrypt_memory(log_n: u8) -> Option<u64> {
    1u64.checked_shl(u32::from(log_n))?
        .checked_mul(128 * u64::from(SCRYPT_R))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hkdf_deterministic() {
        let k1 = hkdf(b"salt", b"label", b"secret").unwrap();
        let k2 = hkdf(b"salt", b"label", b"secret").unwrap();
        assert_eq!(*k1, *k2, "HKDF must be deterministic");
    }

    #[test]
    fn test_hkdf_different_labels() {
        let header = hkdf(b"", b"header", b"secret").unwrap();
        let payload = hkdf(b"", b"payload", b"secret").unwrap();
        assert_ne!(*header, *payload, "different labels must produce different keys");
    }

    #[test]
    fn test_hkdf_different_salts() {
        let k1 = hkdf(&[1u8; 16], b"payload", b"secret").unwrap();
        let k2 = hkdf(&[2u8; 16], b"payload", b"secret").unwrap();
        assert_ne!(*k1, *k2);
    }

    #[test]
    fn test_scrypt_deterministic() {
        // Use a tiny work factor for testing
        let k1 = scrypt(b"hunter2", b"salt", 4).unwrap();
        let k2 = scrypt(b"hunter2", b"salt", 4).unwrap();
        assert_eq!(*k1, *k2);
    }

    #[test]
    fn test_scrypt_different_passwords() {
        let k1 = scrypt(b"password-a", b"salt", 4).unwrap();
        let k2 = scrypt(b"password-b", b"salt", 4).unwrap();
        assert_ne!(*k1, *k2);
    }

    #[test]
    fn test_scrypt_work_factor_changes_key() {
        let k1 = scrypt(b"hunter2", b"salt", 4).unwrap();
        let k2 = scrypt(b"hunter2", b"salt", 5).unwrap();
        assert_ne!(*k1, *k2);
    }

    #[test]
    fn test_scrypt_rejects_absurd_work_factor() {
        let result = scrypt(b"hunter2", b"salt", 64);
        assert!(matches!(result, Err(Error::DerivationFailure(_))));
    }

    #[test]
    fn test_scrypt_memory_cost() {
        assert_eq!(scrypt_memory(10), Some(1 << 20));
        assert_eq!(scrypt_memory(22), Some(SCRYPT_MAX_MEMORY));
        assert_eq!(scrypt_memory(30), Some(1 << 40));
        assert_eq!(scrypt_memory(63), None);
        assert_eq!(scrypt_memory(64), None);
    }

    #[test]
    fn test_scrypt_refuses_oversized_working_set() {
        for log_n in [23, 30] {
            let result = scrypt(b"hunter2", b"salt", log_n);
            assert!(
                matches!(result, Err(Error::DerivationFailure(_))),
                "log_n={log_n} should be refused"
            );
        }
    }
}
