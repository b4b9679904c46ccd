use std::io::Write;

use agewrap_crypto::{decrypt, encrypt, x25519, Identity, Recipient};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn make_data(size: usize) -> Vec<u8> {
    (0..size)
        .map(|i| (i.wrapping_mul(7) ^ (i >> 3)) as u8)
        .collect()
}

fn keypair() -> (Identity, Recipient) {
    let identity = x25519::Identity::generate(&mut StdRng::seed_from_u64(7)).unwrap();
    let recipient = identity.to_public();
    (identity.into(), recipient.into())
}

#[divan::bench(args = [1024, 65536, 1048576])]
fn bench_encrypt(bencher: divan::Bencher, size: usize) {
    let (_, recipient) = keypair();
    let recipients = [recipient];
    let data = make_data(size);
    let mut rng = StdRng::seed_from_u64(1);
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench_local(|| encrypt(divan::black_box(&recipients), divan::black_box(&data), &mut rng).unwrap());
}

#[divan::bench(args = [1024, 65536, 1048576])]
fn bench_decrypt(bencher: divan::Bencher, size: usize) {
    let (identity, recipient) = keypair();
    let identities = [identity];
    let data = make_data(size);
    let container = encrypt(&[recipient], &data, &mut StdRng::seed_from_u64(1)).unwrap();
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| decrypt(divan::black_box(&identities), divan::black_box(&container)).unwrap());
}

#[divan::bench(args = [65536, 1048576])]
fn bench_stream_small_writes(bencher: divan::Bencher, size: usize) {
    let (_, recipient) = keypair();
    let recipients = [recipient];
    let data = make_data(size);
    let mut rng = StdRng::seed_from_u64(1);
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench_local(|| {
            let mut writer = agewrap_crypto::Encryptor::new(&recipients)
                .unwrap()
                .wrap_output(Vec::with_capacity(size + 1024), &mut rng)
                .unwrap();
            for piece in data.chunks(512) {
                writer.write_all(piece).unwrap();
            }
            writer.finish().unwrap()
        });
}

fn main() {
    divan::main();
}
