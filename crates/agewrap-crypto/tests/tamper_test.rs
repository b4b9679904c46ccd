//! Any modification of a container must be rejected before plaintext is
//! released.

use agewrap_crypto::{decrypt, encrypt, x25519, Decryptor, Error, Identity, Recipient, CHUNK_SIZE};
use rand::rngs::StdRng;
use rand::SeedableRng;

const PAYLOAD_NONCE_SIZE: usize = 16;
const TAG_SIZE: usize = 16;

fn keypair(seed: u64) -> (Identity, Recipient) {
    let identity = x25519::Identity::generate(&mut StdRng::seed_from_u64(seed)).unwrap();
    let recipient = identity.to_public();
    (identity.into(), recipient.into())
}

fn header_len(container: &[u8]) -> usize {
    Decryptor::new(container).unwrap().header().to_bytes().len()
}

fn flip(container: &[u8], index: usize) -> Vec<u8> {
    let mut tampered = container.to_vec();
    tampered[index] ^= 0x01;
    tampered
}

#[test]
fn flipped_header_tag_bit() {
    let (identity, recipient) = keypair(1);
    let container = encrypt(&[recipient], b"payload", &mut StdRng::seed_from_u64(2)).unwrap();
    let tampered = flip(&container, header_len(&container) - 1);

    assert!(matches!(
        decrypt(&[identity], &tampered),
        Err(Error::AuthenticationFailure(_))
    ));
}

#[test]
fn flipped_own_stanza_body_bit() {
    let (identity, recipient) = keypair(3);
    let container = encrypt(&[recipient], b"payload", &mut StdRng::seed_from_u64(4)).unwrap();
    // last body byte of the only stanza sits just before the 32-byte tag
    let tampered = flip(&container, header_len(&container) - 33);

    assert!(matches!(
        decrypt(&[identity], &tampered),
        Err(Error::AuthenticationFailure(_))
    ));
}

#[test]
fn flipped_other_recipients_stanza_breaks_header_tag() {
    let (alice, alice_recipient) = keypair(5);
    let (_, bob_recipient) = keypair(6);
    let container = encrypt(
        &[alice_recipient, bob_recipient],
        b"payload",
        &mut StdRng::seed_from_u64(7),
    )
    .unwrap();
    // Bob's stanza is last; Alice still unwraps the file key but the tag no
    // longer matches the header.
    let tampered = flip(&container, header_len(&container) - 33);

    assert!(matches!(
        decrypt(&[alice], &tampered),
        Err(Error::AuthenticationFailure(_))
    ));
}

#[test]
fn flipped_payload_nonce_bit() {
    let (identity, recipient) = keypair(8);
    let container = encrypt(&[recipient], b"payload", &mut StdRng::seed_from_u64(9)).unwrap();
    let tampered = flip(&container, header_len(&container));

    assert!(matches!(
        decrypt(&[identity], &tampered),
        Err(Error::AuthenticationFailure(_))
    ));
}

#[test]
fn flipped_payload_chunk_bit() {
    let (identity, recipient) = keypair(10);
    let plaintext = vec![0x42u8; CHUNK_SIZE + 100];
    let container = encrypt(&[recipient], &plaintext, &mut StdRng::seed_from_u64(11)).unwrap();
    let payload_start = header_len(&container) + PAYLOAD_NONCE_SIZE;

    for offset in [0, CHUNK_SIZE + TAG_SIZE + 3] {
        let tampered = flip(&container, payload_start + offset);
        assert!(
            matches!(decrypt(std::slice::from_ref(&identity), &tampered), Err(Error::AuthenticationFailure(_))),
            "offset={offset}"
        );
    }
}

#[test]
fn truncated_at_chunk_boundary() {
    let (identity, recipient) = keypair(12);
    let plaintext = vec![7u8; CHUNK_SIZE * 2 + 5];
    let container = encrypt(&[recipient], &plaintext, &mut StdRng::seed_from_u64(13)).unwrap();
    let cut = header_len(&container) + PAYLOAD_NONCE_SIZE + 2 * (CHUNK_SIZE + TAG_SIZE);

    assert!(matches!(
        decrypt(&[identity], &container[..cut]),
        Err(Error::ChunkOrderingViolation(_))
    ));
}

#[test]
fn truncated_mid_chunk() {
    let (identity, recipient) = keypair(14);
    let container = encrypt(&[recipient], b"some payload", &mut StdRng::seed_from_u64(15)).unwrap();
    let cut = container.len() - 3;
    assert!(decrypt(&[identity], &container[..cut]).is_err());
}

#[test]
fn truncated_header() {
    let (identity, recipient) = keypair(16);
    let container = encrypt(&[recipient], b"x", &mut StdRng::seed_from_u64(17)).unwrap();
    let cut = header_len(&container) - 10;

    assert!(matches!(
        decrypt(&[identity], &container[..cut]),
        Err(Error::MalformedHeader(_))
    ));
}

#[test]
fn trailing_garbage_rejected() {
    let (identity, recipient) = keypair(18);
    let mut container = encrypt(&[recipient], b"x", &mut StdRng::seed_from_u64(19)).unwrap();
    container.extend_from_slice(b"trailing");
    assert!(decrypt(&[identity], &container).is_err());
}

#[test]
fn wrong_key_rejected() {
    let (_, recipient) = keypair(20);
    let (stranger, _) = keypair(21);
    let container = encrypt(&[recipient], b"x", &mut StdRng::seed_from_u64(22)).unwrap();
    assert!(matches!(
        decrypt(&[stranger], &container),
        Err(Error::AuthenticationFailure(_))
    ));
}
