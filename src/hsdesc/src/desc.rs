//! Top-level descriptor codec.
//!
//! The outer envelope is a line-oriented plaintext document:
//!
//! ```text
//! hs-descriptor <version>
//! descriptor-lifetime <minutes>
//! descriptor-signing-key-cert
//! <ED25519 CERT block>
//! revision-counter <u64>
//! encrypted
//! <MESSAGE block>
//! signature <base64 Ed25519 signature>
//! ```
//!
//! Exactly these directives, in exactly this order, nothing after the
//! signature line. The signature covers every byte from the start of the
//! document through the newline before the signature line, prefixed by a
//! domain-separation string, and is made with the key certified by the
//! signing-key certificate. The MESSAGE block holds the encrypted inner
//! section (see [`crate::envelope`]).
//!
//! Encoding and decoding are pure functions of their inputs: the clock
//! and the randomness source are injected, no global state is read, and
//! identical inputs produce byte-identical output.

use rand::{CryptoRng, RngCore};

use crate::armor::{self, KIND_ED25519_CERT, KIND_MESSAGE};
use crate::cert::{Cert, CertKeyType, CertPurpose, CERT_LIFETIME_SECS};
use crate::doc;
use crate::envelope;
use crate::inner::InnerDoc;
use crate::keys::{BlindedKeypair, SigningKeypair, Subcredential};
use crate::{DescError, Result};

/// Earliest supported descriptor format version.
pub const VERSION_MIN: u32 = 3;
/// Latest supported descriptor format version.
pub const VERSION_MAX: u32 = 3;
/// Hard cap on the encoded descriptor, enforced before any parsing.
pub const MAX_DESCRIPTOR_LEN: usize = 50 * 1024;
/// Descriptor lifetime is expressed in minutes and bounded at 12 hours.
pub const MAX_LIFETIME_MINUTES: u32 = 720;

/// Domain separation for the trailing signature.
const SIGNATURE_PREFIX: &[u8] = b"Tor onion service descriptor sig v3";

/// Return true iff the given descriptor format version is supported.
pub fn is_supported_version(version: u32) -> bool {
    (VERSION_MIN..=VERSION_MAX).contains(&version)
}

/// A descriptor as the publishing service holds it: keypairs included.
/// Dropped (and its secret material zeroed) once published.
pub struct Descriptor {
    pub version: u32,
    pub lifetime_minutes: u32,
    pub revision_counter: u64,
    pub signing_kp: SigningKeypair,
    pub blinded_kp: BlindedKeypair,
    /// Certificate over the signing key, issued by the blinded key.
    pub signing_cert: Cert,
    /// Client-auth secret mixed into the envelope KDF; `None` on the
    /// plain publication path.
    pub subcredential: Option<Subcredential>,
    pub inner: InnerDoc,
}

impl Descriptor {
    /// Assemble a descriptor at the latest supported version, issuing the
    /// signing-key certificate under the blinded key.
    pub fn create(
        signing_kp: SigningKeypair,
        blinded_kp: BlindedKeypair,
        lifetime_minutes: u32,
        revision_counter: u64,
        inner: InnerDoc,
        now: u64,
    ) -> Result<Self> {
        check_lifetime(lifetime_minutes)?;
        let signing_cert = Cert::create(
            CertPurpose::DescSigning,
            CertKeyType::Ed25519,
            &signing_kp.public_bytes(),
            &blinded_kp,
            now,
            CERT_LIFETIME_SECS,
        )?;
        Ok(Self {
            version: VERSION_MAX,
            lifetime_minutes,
            revision_counter,
            signing_kp,
            blinded_kp,
            signing_cert,
            subcredential: None,
            inner,
        })
    }
}

/// A verified descriptor as the fetching client sees it: public keys
/// only, inner section already authenticated and validated.
#[derive(Debug)]
pub struct DecodedDescriptor {
    pub version: u32,
    pub lifetime_minutes: u32,
    pub revision_counter: u64,
    /// Subject of the signing-key certificate; verified the signature.
    pub signing_key: [u8; 32],
    /// Issuer embedded in the signing-key certificate.
    pub blinded_key: [u8; 32],
    pub signing_cert: Cert,
    pub inner: InnerDoc,
}

/// Encode and sign a descriptor. The encrypted blob is produced first,
/// then the whole document is serialized and signed; signing before
/// encrypting is impossible by construction.
pub fn encode_descriptor(
    desc: &Descriptor,
    rng: &mut (impl RngCore + CryptoRng),
) -> Result<String> {
    if !is_supported_version(desc.version) {
        return Err(DescError::UnsupportedVersion(desc.version));
    }
    check_lifetime(desc.lifetime_minutes)?;
    if desc.signing_cert.purpose() != CertPurpose::DescSigning
        || desc.signing_cert.certified_key() != &desc.signing_kp.public_bytes()
        || desc.signing_cert.signing_key() != Some(&desc.blinded_kp.public_bytes())
    {
        return Err(DescError::BadCertificate(
            "signing-key certificate does not match the descriptor keys".into(),
        ));
    }

    let plaintext = desc.inner.encode()?;
    let blob = envelope::seal(
        plaintext.as_bytes(),
        &desc.blinded_kp.public_bytes(),
        desc.subcredential.as_ref(),
        desc.revision_counter,
        rng,
    )?;

    let mut text = String::with_capacity(blob.len() * 4 / 3 + 1024);
    text.push_str("hs-descriptor ");
    text.push_str(&desc.version.to_string());
    text.push('\n');
    text.push_str("descriptor-lifetime ");
    text.push_str(&desc.lifetime_minutes.to_string());
    text.push('\n');
    text.push_str("descriptor-signing-key-cert\n");
    text.push_str(&armor::armor(KIND_ED25519_CERT, desc.signing_cert.encoded()));
    text.push('\n');
    text.push_str("revision-counter ");
    text.push_str(&desc.revision_counter.to_string());
    text.push('\n');
    text.push_str("encrypted\n");
    text.push_str(&armor::armor(KIND_MESSAGE, &blob));
    text.push('\n');

    let mut signed = Vec::with_capacity(SIGNATURE_PREFIX.len() + text.len());
    signed.extend_from_slice(SIGNATURE_PREFIX);
    signed.extend_from_slice(text.as_bytes());
    let signature = desc.signing_kp.sign(&signed);

    text.push_str("signature ");
    text.push_str(&armor::b64_encode(&signature));
    text.push('\n');

    if text.len() > MAX_DESCRIPTOR_LEN {
        return Err(DescError::TooLarge(
            "encoded descriptor exceeds the maximum length".into(),
        ));
    }
    Ok(text)
}

/// Decode and fully verify a descriptor document.
///
/// `subcredential` is required only for client-authenticated services;
/// without it the plain validation path runs. `now` is the caller's
/// clock in seconds since the epoch. On any failure no partial state is
/// returned.
pub fn decode_descriptor(
    text: &str,
    subcredential: Option<&Subcredential>,
    now: u64,
) -> Result<DecodedDescriptor> {
    if text.len() > MAX_DESCRIPTOR_LEN {
        return Err(DescError::TooLarge(
            "descriptor exceeds the maximum length".into(),
        ));
    }

    let items = doc::tokenize(text)?;
    if items.len() != 6 {
        return Err(DescError::Malformed(
            "descriptor does not have exactly its six directives".into(),
        ));
    }

    let version_item = &items[0];
    if version_item.keyword != "hs-descriptor" {
        return Err(DescError::Malformed(
            "descriptor does not start with hs-descriptor".into(),
        ));
    }
    version_item.reject_object()?;
    let version = parse_u32_arg(version_item.args.as_slice())?;
    if !is_supported_version(version) {
        return Err(DescError::UnsupportedVersion(version));
    }

    let lifetime_item = &items[1];
    if lifetime_item.keyword != "descriptor-lifetime" {
        return Err(DescError::Malformed(
            "descriptor-lifetime is missing or out of order".into(),
        ));
    }
    lifetime_item.reject_object()?;
    let lifetime_minutes = parse_u32_arg(lifetime_item.args.as_slice())?;
    check_lifetime(lifetime_minutes)?;

    let cert_item = &items[2];
    if cert_item.keyword != "descriptor-signing-key-cert" || !cert_item.args.is_empty() {
        return Err(DescError::Malformed(
            "descriptor-signing-key-cert is missing or out of order".into(),
        ));
    }
    let signing_cert = Cert::parse(cert_item.object_of_kind(KIND_ED25519_CERT)?)?;
    signing_cert.validate(CertPurpose::DescSigning, None, now)?;
    if signing_cert.key_type() != CertKeyType::Ed25519 {
        return Err(DescError::BadCertificate(
            "signing-key certificate does not certify an Ed25519 key".into(),
        ));
    }
    let signing_key = *signing_cert.certified_key();
    let blinded_key = *signing_cert.signing_key().ok_or_else(|| {
        DescError::BadCertificate("signing-key certificate lacks its issuer".into())
    })?;

    let revision_item = &items[3];
    if revision_item.keyword != "revision-counter" {
        return Err(DescError::Malformed(
            "revision-counter is missing or out of order".into(),
        ));
    }
    revision_item.reject_object()?;
    if revision_item.args.len() != 1 {
        return Err(DescError::Malformed(
            "revision-counter takes exactly one argument".into(),
        ));
    }
    let revision_counter = doc::parse_uint(revision_item.args[0])?;

    let encrypted_item = &items[4];
    if encrypted_item.keyword != "encrypted" || !encrypted_item.args.is_empty() {
        return Err(DescError::Malformed(
            "encrypted is missing or out of order".into(),
        ));
    }
    let blob = encrypted_item.object_of_kind(KIND_MESSAGE)?;

    let signature_item = &items[5];
    if signature_item.keyword != "signature" {
        return Err(DescError::Malformed(
            "signature is missing or out of order".into(),
        ));
    }
    signature_item.reject_object()?;
    if signature_item.args.len() != 1 {
        return Err(DescError::Malformed(
            "signature takes exactly one argument".into(),
        ));
    }
    verify_signature(
        text,
        signature_item.offset,
        signature_item.args[0],
        &signing_key,
    )?;

    let padded = envelope::open(blob, &blinded_key, subcredential, revision_counter)?;
    let plaintext = envelope::strip_padding(&padded)?;
    let plaintext = std::str::from_utf8(plaintext)
        .map_err(|_| DescError::Malformed("encrypted section is not valid text".into()))?;
    let inner = InnerDoc::decode(plaintext, &signing_key, &blinded_key, now)?;

    Ok(DecodedDescriptor {
        version,
        lifetime_minutes,
        revision_counter,
        signing_key,
        blinded_key,
        signing_cert,
        inner,
    })
}

fn check_lifetime(minutes: u32) -> Result<()> {
    if minutes == 0 || minutes > MAX_LIFETIME_MINUTES {
        return Err(DescError::Malformed(
            "descriptor lifetime is out of range".into(),
        ));
    }
    Ok(())
}

fn parse_u32_arg(args: &[&str]) -> Result<u32> {
    let [arg] = args else {
        return Err(DescError::Malformed(
            "directive takes exactly one integer argument".into(),
        ));
    };
    doc::parse_uint(arg)?
        .try_into()
        .map_err(|_| DescError::Malformed("integer field is out of range".into()))
}

/// Reconstruct the signed byte range exactly as the encoder produced it
/// and verify the trailing signature with the certified signing key.
fn verify_signature(
    text: &str,
    signature_offset: usize,
    token: &str,
    signing_key: &[u8; 32],
) -> Result<()> {
    use ed25519_dalek::{Signature, Verifier, VerifyingKey};

    let sig_bytes = armor::b64_decode(token)
        .map_err(|_| DescError::BadSignature("signature token is not valid base64".into()))?;
    let sig_bytes: [u8; 64] = sig_bytes
        .try_into()
        .map_err(|_| DescError::BadSignature("signature is not 64 bytes".into()))?;

    let verifying = VerifyingKey::from_bytes(signing_key)
        .map_err(|_| DescError::BadSignature("signing key is not a valid Ed25519 key".into()))?;

    let mut signed = Vec::with_capacity(SIGNATURE_PREFIX.len() + signature_offset);
    signed.extend_from_slice(SIGNATURE_PREFIX);
    signed.extend_from_slice(&text.as_bytes()[..signature_offset]);
    verifying
        .verify(&signed, &Signature::from_bytes(&sig_bytes))
        .map_err(|_| DescError::BadSignature("descriptor signature failed verification".into()))
}
