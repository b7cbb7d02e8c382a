//! Deterministic vectors: fixed keys and a fixed RNG must reproduce the
//! encoder's output byte for byte, and the padding and length laws must
//! hold across their whole ranges.

use std::net::Ipv4Addr;

use hsdesc::envelope::{MAC_LEN, SALT_LEN};
use hsdesc::{
    encode_descriptor, encrypted_data_length_is_valid, envelope, BlindedKeypair, Descriptor,
    EncKeypair, InnerDoc, IntroPoint, LinkSpec, SigningKeypair, MAX_PADDED_PLAINTEXT_LEN,
    PADDING_QUANTUM,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

const NOW: u64 = 1_690_000_000;

/// Fixed seeds so every keypair in the fixture is reproducible.
const IDENTITY_SEED: [u8; 32] = [
    0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f,
    0x10, 0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17, 0x18, 0x19, 0x1a, 0x1b, 0x1c, 0x1d, 0x1e,
    0x1f, 0x20,
];
const SIGNING_SEED: [u8; 32] = [0x42; 32];
const AUTH_SEED: [u8; 32] = [0x43; 32];
const ENC_SEED: [u8; 32] = [0x44; 32];

fn deterministic_descriptor() -> Descriptor {
    let identity = SigningKeypair::from_secret_bytes(&IDENTITY_SEED).expect("test: seed");
    let blinded = BlindedKeypair::derive(&identity, 1440, 96).expect("test: blinding");
    let signing = SigningKeypair::from_secret_bytes(&SIGNING_SEED).expect("test: seed");
    let auth = SigningKeypair::from_secret_bytes(&AUTH_SEED).expect("test: seed");
    let enc = EncKeypair::from_secret_bytes(&ENC_SEED);

    let mut inner = InnerDoc::new();
    inner.auth_types = vec!["ed25519".to_string()];
    inner.intro_points = vec![IntroPoint::for_ntor(
        vec![LinkSpec::Ipv4 {
            addr: Ipv4Addr::new(1, 2, 3, 4),
            port: 9001,
        }],
        &auth.public_bytes(),
        &enc.public_bytes(),
        &signing,
        NOW,
    )
    .expect("test: intro point")];

    Descriptor::create(signing, blinded, 180, 42, inner, NOW).expect("test: descriptor")
}

#[test]
fn encode_is_byte_identical_under_identical_randomness() {
    let a = encode_descriptor(&deterministic_descriptor(), &mut StdRng::from_seed([9; 32]))
        .expect("test: encode");
    let b = encode_descriptor(&deterministic_descriptor(), &mut StdRng::from_seed([9; 32]))
        .expect("test: encode");
    assert_eq!(a, b);
}

#[test]
fn encode_differs_under_different_randomness() {
    let a = encode_descriptor(&deterministic_descriptor(), &mut StdRng::from_seed([9; 32]))
        .expect("test: encode");
    let b = encode_descriptor(&deterministic_descriptor(), &mut StdRng::from_seed([10; 32]))
        .expect("test: encode");
    assert_ne!(a, b, "a fresh salt must change the encrypted blob");
}

#[test]
fn padding_law_holds_across_the_range() {
    assert_eq!(envelope::padded_len(0), 0);
    for len in [1, 2, 9_999, 10_000, 10_001, 19_999, 20_000, 29_000] {
        let padded = envelope::padded_len(len);
        assert!(padded >= len, "padded length may never shrink");
        assert_eq!(padded % PADDING_QUANTUM, 0, "padding quantum violated");
        assert!(padded < len + PADDING_QUANTUM, "padding overshoots");
    }
}

#[test]
fn envelope_length_law() {
    let overhead = SALT_LEN + MAC_LEN;
    assert!(encrypted_data_length_is_valid(overhead + PADDING_QUANTUM));
    assert!(encrypted_data_length_is_valid(overhead + 2 * PADDING_QUANTUM));
    assert!(encrypted_data_length_is_valid(
        overhead + MAX_PADDED_PLAINTEXT_LEN
    ));

    assert!(!encrypted_data_length_is_valid(0));
    assert!(!encrypted_data_length_is_valid(overhead));
    assert!(!encrypted_data_length_is_valid(overhead + PADDING_QUANTUM - 1));
    assert!(!encrypted_data_length_is_valid(overhead + PADDING_QUANTUM + 1));
    assert!(!encrypted_data_length_is_valid(
        overhead + MAX_PADDED_PLAINTEXT_LEN + PADDING_QUANTUM
    ));
}

#[test]
fn sealed_blob_has_the_documented_layout() {
    let blinded = [0x31; 32];
    let blob = envelope::seal(
        b"create2-formats 2\n",
        &blinded,
        None,
        1,
        &mut StdRng::from_seed([1; 32]),
    )
    .expect("test: seal");

    assert_eq!(blob.len(), SALT_LEN + PADDING_QUANTUM + MAC_LEN);
    assert!(encrypted_data_length_is_valid(blob.len()));

    let padded = envelope::open(&blob, &blinded, None, 1).expect("test: open");
    let plaintext = envelope::strip_padding(&padded).expect("test: padding");
    assert_eq!(plaintext, b"create2-formats 2\n");
}
