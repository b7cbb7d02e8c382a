//! End-to-end encode/decode round-trips over realistic descriptors.

use std::net::{Ipv4Addr, Ipv6Addr};

use hsdesc::{
    decode_descriptor, encode_descriptor, BlindedKeypair, Descriptor, EncKeypair, InnerDoc,
    IntroPoint, LegacyKeypair, LinkSpec, SigningKeypair, VERSION_MAX,
};
use rand::rngs::{OsRng, StdRng};
use rand::SeedableRng;

const NOW: u64 = 1_690_000_000;

const LEGACY_ID_HEX: &str = "0299F268FCA9D55CD157976D39AE92B4B455B3A8";

fn legacy_id() -> [u8; 20] {
    hex::decode(LEGACY_ID_HEX)
        .expect("test: fixture hex")
        .try_into()
        .expect("test: fixture length")
}

fn rng() -> StdRng {
    StdRng::from_seed([0x2A; 32])
}

fn ntor_point(signing: &SigningKeypair, specs: Vec<LinkSpec>) -> IntroPoint {
    let auth = SigningKeypair::generate(&mut OsRng);
    let enc = EncKeypair::generate(&mut OsRng);
    IntroPoint::for_ntor(
        specs,
        &auth.public_bytes(),
        &enc.public_bytes(),
        signing,
        NOW,
    )
    .expect("test: ntor intro point")
}

fn legacy_point(
    signing: &SigningKeypair,
    blinded: &BlindedKeypair,
    specs: Vec<LinkSpec>,
) -> IntroPoint {
    let auth = SigningKeypair::generate(&mut OsRng);
    let legacy = LegacyKeypair::generate(&mut OsRng).expect("test: RSA keygen");
    IntroPoint::for_legacy(
        specs,
        &auth.public_bytes(),
        &legacy,
        signing,
        &blinded.public_bytes(),
        NOW,
    )
    .expect("test: legacy intro point")
}

/// The reference fixture: four introduction points covering IPv4, IPv6,
/// and both legacy shapes (identity plus address, identity only).
fn build_descriptor(with_intro_points: bool) -> Descriptor {
    let signing = SigningKeypair::generate(&mut OsRng);
    let blinded = BlindedKeypair::generate(&mut OsRng);

    let mut inner = InnerDoc::new();
    inner.auth_types = vec!["ed25519".to_string()];
    if with_intro_points {
        inner.intro_points = vec![
            ntor_point(
                &signing,
                vec![LinkSpec::Ipv4 {
                    addr: Ipv4Addr::new(1, 2, 3, 4),
                    port: 9001,
                }],
            ),
            ntor_point(
                &signing,
                vec![LinkSpec::Ipv6 {
                    addr: "2600::1".parse::<Ipv6Addr>().expect("test: fixture addr"),
                    port: 9001,
                }],
            ),
            // Legacy intro points carry only the identity fingerprint; no
            // reachable address is required.
            legacy_point(&signing, &blinded, vec![LinkSpec::LegacyId(legacy_id())]),
            legacy_point(&signing, &blinded, vec![LinkSpec::LegacyId(legacy_id())]),
        ];
    }

    Descriptor::create(signing, blinded, 180, 42, inner, NOW).expect("test: descriptor")
}

#[test]
fn four_intro_point_descriptor_roundtrips() {
    let desc = build_descriptor(true);
    let text = encode_descriptor(&desc, &mut rng()).expect("test: encode");

    let decoded = decode_descriptor(&text, None, NOW + 30).expect("test: decode");

    assert_eq!(decoded.version, VERSION_MAX);
    assert_eq!(decoded.lifetime_minutes, 180);
    assert_eq!(decoded.revision_counter, 42);
    assert_eq!(decoded.signing_key, desc.signing_kp.public_bytes());
    assert_eq!(decoded.blinded_key, desc.blinded_kp.public_bytes());
    assert_eq!(decoded.signing_cert, desc.signing_cert);
    assert_eq!(decoded.inner, desc.inner);
    assert_eq!(decoded.inner.intro_points.len(), 4);
}

#[test]
fn intro_point_order_is_preserved() {
    let desc = build_descriptor(true);
    let text = encode_descriptor(&desc, &mut rng()).unwrap();
    let decoded = decode_descriptor(&text, None, NOW + 30).unwrap();

    let original: Vec<_> = desc
        .inner
        .intro_points
        .iter()
        .map(|ip| ip.link_specifiers.clone())
        .collect();
    let recovered: Vec<_> = decoded
        .inner
        .intro_points
        .iter()
        .map(|ip| ip.link_specifiers.clone())
        .collect();
    assert_eq!(original, recovered);
}

#[test]
fn descriptor_without_intro_points_roundtrips() {
    let desc = build_descriptor(false);
    let text = encode_descriptor(&desc, &mut rng()).unwrap();

    let decoded = decode_descriptor(&text, None, NOW + 30).unwrap();
    assert!(decoded.inner.intro_points.is_empty());
    assert!(!decoded.inner.create2_formats.is_empty());
    assert_eq!(decoded.inner.auth_types, vec!["ed25519".to_string()]);
}

#[test]
fn unknown_link_specifier_survives_roundtrip() {
    let signing = SigningKeypair::generate(&mut OsRng);
    let blinded = BlindedKeypair::generate(&mut OsRng);

    let opaque = LinkSpec::Unknown {
        ls_type: 0x2A,
        payload: vec![0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x01],
    };
    let mut inner = InnerDoc::new();
    inner.intro_points = vec![ntor_point(
        &signing,
        vec![
            LinkSpec::Ipv4 {
                addr: Ipv4Addr::new(10, 1, 2, 3),
                port: 443,
            },
            opaque.clone(),
        ],
    )];

    let desc = Descriptor::create(signing, blinded, 60, 7, inner, NOW).unwrap();
    let text = encode_descriptor(&desc, &mut rng()).unwrap();
    let decoded = decode_descriptor(&text, None, NOW + 30).unwrap();

    assert_eq!(decoded.inner.intro_points[0].link_specifiers[1], opaque);
}

#[test]
fn blinded_derivation_works_end_to_end() {
    let identity = SigningKeypair::generate(&mut OsRng);
    let blinded = BlindedKeypair::derive(&identity, 1234, 1440).expect("test: blinding");
    let signing = SigningKeypair::generate(&mut OsRng);

    let desc =
        Descriptor::create(signing, blinded, 30, 1, InnerDoc::new(), NOW).expect("test: descriptor");
    let text = encode_descriptor(&desc, &mut rng()).unwrap();
    let decoded = decode_descriptor(&text, None, NOW + 5).unwrap();
    assert_eq!(decoded.blinded_key, desc.blinded_kp.public_bytes());
}

#[test]
fn encoded_descriptor_stays_under_the_length_cap() {
    let desc = build_descriptor(true);
    let text = encode_descriptor(&desc, &mut rng()).unwrap();
    assert!(text.len() <= hsdesc::MAX_DESCRIPTOR_LEN);
}
