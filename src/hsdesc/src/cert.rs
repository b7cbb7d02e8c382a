//! Certificates binding descriptor keys to the blinded service identity.
//!
//! Two certificate shapes appear in a descriptor:
//!
//! - [`Cert`], the fixed-shape Ed25519 certificate: a typed binding of a
//!   subject public key to an issuer signing key with an expiry measured
//!   in hours since the epoch. Three purposes are used (§ the purpose
//!   table on [`CertPurpose`]).
//! - [`CrossCert`], the legacy cross-certificate: an RSA-1024 signature by
//!   which a legacy encryption key consents to being bound under the
//!   Ed25519 blinded identity.
//!
//! Wire format of [`Cert`]:
//!
//! ```text
//! version(1)=0x01 | purpose(1) | expiry_hours(4 BE) | key_type(1) |
//! certified_key(32) | n_extensions(1) | extensions... | signature(64)
//! ```
//!
//! Extension: `len(2 BE) | type(1) | flags(1) | data(len)`. The only
//! recognized extension embeds the issuer signing key; an unrecognized
//! extension with the affects-validation flag set rejects the whole
//! certificate.

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use rsa::{Pkcs1v15Sign, RsaPublicKey};
use sha2::{Digest, Sha256};

use crate::keys::{Ed25519Signer, LegacyKeypair};
use crate::{DescError, Result};

/// Certificate format version.
const CERT_VERSION: u8 = 0x01;
/// Extension type: issuer signing key embedded in the certificate.
const EXT_SIGNED_WITH_KEY: u8 = 0x04;
/// Extension flag: an unrecognized extension carrying it is fatal.
const EXT_FLAG_AFFECTS_VALIDATION: u8 = 0x01;
/// Raw Ed25519 signature length.
const ED25519_SIG_LEN: usize = 64;
/// Body of a certificate before extensions: version, purpose, expiry,
/// key type, certified key, extension count.
const CERT_HEADER_LEN: usize = 1 + 1 + 4 + 1 + 32 + 1;

/// Grace allowed on create-side expiry checks; verify-side gets none.
const CREATE_CLOCK_SKEW_SECS: u64 = 10;

/// Lifetime the builders give every certificate embedded in a descriptor.
pub const CERT_LIFETIME_SECS: u64 = 24 * 60 * 60;

/// Domain prefix for the legacy cross-certificate digest.
const CROSSCERT_PREFIX: &[u8] = b"Tor onion service cross-certificate";

/// What a certificate certifies, and who must have issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertPurpose {
    /// Short-term descriptor signing key, issued by the blinded key.
    DescSigning,
    /// Introduction-point authentication key, issued by the descriptor
    /// signing key.
    IntroAuth,
    /// Introduction-point curve25519 encryption key, issued by the
    /// descriptor signing key.
    IntroEnc,
}

impl CertPurpose {
    pub fn tag(self) -> u8 {
        match self {
            CertPurpose::DescSigning => 0x08,
            CertPurpose::IntroAuth => 0x09,
            CertPurpose::IntroEnc => 0x0B,
        }
    }

    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0x08 => Some(CertPurpose::DescSigning),
            0x09 => Some(CertPurpose::IntroAuth),
            0x0B => Some(CertPurpose::IntroEnc),
            _ => None,
        }
    }
}

/// Key algorithm of the certified key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertKeyType {
    Ed25519,
    Curve25519,
}

impl CertKeyType {
    fn tag(self) -> u8 {
        match self {
            CertKeyType::Ed25519 => 0x01,
            CertKeyType::Curve25519 => 0x02,
        }
    }

    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0x01 => Some(CertKeyType::Ed25519),
            0x02 => Some(CertKeyType::Curve25519),
            _ => None,
        }
    }
}

/// A parsed Ed25519 certificate.
///
/// The raw encoded bytes are retained so the signature can be re-verified
/// at any time and so re-encoding is byte-exact.
#[derive(Debug, Clone)]
pub struct Cert {
    purpose: CertPurpose,
    expiry_hours: u32,
    key_type: CertKeyType,
    certified_key: [u8; 32],
    signing_key: Option<[u8; 32]>,
    encoded: Vec<u8>,
}

impl PartialEq for Cert {
    fn eq(&self, other: &Self) -> bool {
        self.encoded == other.encoded
    }
}

impl Eq for Cert {}

impl Cert {
    /// Issue a certificate over `certified_key`, signed by `signer`, valid
    /// for `lifetime` seconds past `now`. The issuer key is always
    /// embedded. The freshly encoded bytes are parsed and verified before
    /// being returned.
    pub fn create(
        purpose: CertPurpose,
        key_type: CertKeyType,
        certified_key: &[u8; 32],
        signer: &impl Ed25519Signer,
        now: u64,
        lifetime: u64,
    ) -> Result<Self> {
        let expiry_hours: u32 = (now + lifetime)
            .div_ceil(3600)
            .try_into()
            .map_err(|_| DescError::BadCertificate("expiry does not fit the hour field".into()))?;

        let signing_key = signer.public_bytes();
        let mut encoded = Vec::with_capacity(CERT_HEADER_LEN + 4 + 32 + ED25519_SIG_LEN);
        encoded.push(CERT_VERSION);
        encoded.push(purpose.tag());
        encoded.extend_from_slice(&expiry_hours.to_be_bytes());
        encoded.push(key_type.tag());
        encoded.extend_from_slice(certified_key);
        encoded.push(1); // extension count
        encoded.extend_from_slice(&32u16.to_be_bytes());
        encoded.push(EXT_SIGNED_WITH_KEY);
        encoded.push(0); // flags
        encoded.extend_from_slice(&signing_key);

        let signature = signer.sign(&encoded);
        encoded.extend_from_slice(&signature);

        let cert = Cert::parse(&encoded)?;
        cert.validate(
            purpose,
            Some(&signing_key),
            now.saturating_sub(CREATE_CLOCK_SKEW_SECS),
        )?;
        Ok(cert)
    }

    /// Parse a certificate from its encoded bytes. Structure only; call
    /// [`validate`](Self::validate) before trusting it.
    pub fn parse(encoded: &[u8]) -> Result<Self> {
        let mut rest = encoded;

        let header = take(&mut rest, CERT_HEADER_LEN)?;
        if header[0] != CERT_VERSION {
            return Err(DescError::BadCertificate(
                "unrecognized certificate version".into(),
            ));
        }
        let purpose = CertPurpose::from_tag(header[1])
            .ok_or_else(|| DescError::BadCertificate("unrecognized certificate purpose".into()))?;
        let expiry_hours = u32::from_be_bytes([header[2], header[3], header[4], header[5]]);
        let key_type = CertKeyType::from_tag(header[6])
            .ok_or_else(|| DescError::BadCertificate("unrecognized certified key type".into()))?;
        let mut certified_key = [0u8; 32];
        certified_key.copy_from_slice(&header[7..39]);
        let n_extensions = header[39];

        let mut signing_key = None;
        for _ in 0..n_extensions {
            let ext_header = take(&mut rest, 4)?;
            let ext_len = u16::from_be_bytes([ext_header[0], ext_header[1]]) as usize;
            let ext_type = ext_header[2];
            let ext_flags = ext_header[3];
            let ext_data = take(&mut rest, ext_len)?;
            if ext_type == EXT_SIGNED_WITH_KEY {
                if signing_key.is_some() {
                    return Err(DescError::BadCertificate(
                        "duplicate signing-key extension".into(),
                    ));
                }
                if ext_data.len() != 32 {
                    return Err(DescError::BadCertificate(
                        "signing-key extension has the wrong length".into(),
                    ));
                }
                let mut key = [0u8; 32];
                key.copy_from_slice(ext_data);
                signing_key = Some(key);
            } else if ext_flags & EXT_FLAG_AFFECTS_VALIDATION != 0 {
                return Err(DescError::BadCertificate(
                    "unrecognized extension affects validation".into(),
                ));
            }
        }

        take(&mut rest, ED25519_SIG_LEN)?;
        if !rest.is_empty() {
            return Err(DescError::BadCertificate(
                "trailing bytes after certificate signature".into(),
            ));
        }

        Ok(Cert {
            purpose,
            expiry_hours,
            key_type,
            certified_key,
            signing_key,
            encoded: encoded.to_vec(),
        })
    }

    /// Validate this certificate in its context: expected purpose, an
    /// optional expected issuer key, and the caller's clock.
    ///
    /// The signing-key extension is mandatory in descriptors, so a
    /// certificate without one fails here even when an expected issuer
    /// would have been available out of band.
    pub fn validate(
        &self,
        purpose: CertPurpose,
        expected_issuer: Option<&[u8; 32]>,
        now: u64,
    ) -> Result<()> {
        if self.purpose != purpose {
            return Err(DescError::BadCertificate(
                "certificate purpose does not match its position".into(),
            ));
        }
        let signing_key = self.signing_key.ok_or_else(|| {
            DescError::BadCertificate("certificate lacks the signing-key extension".into())
        })?;
        if let Some(expected) = expected_issuer {
            if &signing_key != expected {
                return Err(DescError::BadCertificate(
                    "certificate issuer does not match its context".into(),
                ));
            }
        }
        if now >= self.expiry_epoch_secs() {
            return Err(DescError::Expired(
                "certificate expiry is at or before the verification time".into(),
            ));
        }

        let verifying = VerifyingKey::from_bytes(&signing_key).map_err(|_| {
            DescError::BadCertificate("certificate issuer key is not a valid Ed25519 key".into())
        })?;
        let signed_len = self.encoded.len() - ED25519_SIG_LEN;
        let mut sig = [0u8; ED25519_SIG_LEN];
        sig.copy_from_slice(&self.encoded[signed_len..]);
        verifying
            .verify(&self.encoded[..signed_len], &Signature::from_bytes(&sig))
            .map_err(|_| {
                DescError::BadCertificate("certificate signature failed verification".into())
            })
    }

    pub fn purpose(&self) -> CertPurpose {
        self.purpose
    }

    pub fn key_type(&self) -> CertKeyType {
        self.key_type
    }

    /// The subject public key this certificate certifies.
    pub fn certified_key(&self) -> &[u8; 32] {
        &self.certified_key
    }

    /// The embedded issuer signing key, when present.
    pub fn signing_key(&self) -> Option<&[u8; 32]> {
        self.signing_key.as_ref()
    }

    /// Expiry in seconds since the epoch (hour granularity on the wire).
    pub fn expiry_epoch_secs(&self) -> u64 {
        u64::from(self.expiry_hours) * 3600
    }

    /// The raw encoded certificate, signature included.
    pub fn encoded(&self) -> &[u8] {
        &self.encoded
    }
}

/// Legacy cross-certificate: the RSA encryption key signs the blinded
/// identity key plus an expiry, proving consent to the binding.
///
/// Wire format: `blinded_key(32) | expiry_hours(4 BE) | sig_len(2 BE) |
/// rsa_signature`. The signature is PKCS#1 v1.5 over the SHA-256 digest
/// of a domain prefix and the first 36 bytes.
#[derive(Debug, Clone)]
pub struct CrossCert {
    blinded_key: [u8; 32],
    expiry_hours: u32,
    signature: Vec<u8>,
    encoded: Vec<u8>,
}

impl PartialEq for CrossCert {
    fn eq(&self, other: &Self) -> bool {
        self.encoded == other.encoded
    }
}

impl Eq for CrossCert {}

impl CrossCert {
    /// Issue a cross-certificate binding `legacy` to `blinded_key`, valid
    /// for `lifetime` seconds past `now`.
    pub fn create(
        legacy: &LegacyKeypair,
        blinded_key: &[u8; 32],
        now: u64,
        lifetime: u64,
    ) -> Result<Self> {
        let expiry_hours: u32 = (now + lifetime)
            .div_ceil(3600)
            .try_into()
            .map_err(|_| DescError::BadCertificate("expiry does not fit the hour field".into()))?;

        let digest = crosscert_digest(blinded_key, expiry_hours);
        let signature = legacy
            .secret
            .sign(Pkcs1v15Sign::new::<Sha256>(), &digest)
            .map_err(|e| DescError::BadCertificate(format!("RSA signing failed: {e}")))?;
        let sig_len: u16 = signature
            .len()
            .try_into()
            .map_err(|_| DescError::BadCertificate("RSA signature is too long".into()))?;

        let mut encoded = Vec::with_capacity(32 + 4 + 2 + signature.len());
        encoded.extend_from_slice(blinded_key);
        encoded.extend_from_slice(&expiry_hours.to_be_bytes());
        encoded.extend_from_slice(&sig_len.to_be_bytes());
        encoded.extend_from_slice(&signature);

        let cert = CrossCert::parse(&encoded)?;
        cert.validate(
            &legacy.public,
            blinded_key,
            now.saturating_sub(CREATE_CLOCK_SKEW_SECS),
        )?;
        Ok(cert)
    }

    /// Parse a cross-certificate from its encoded bytes.
    pub fn parse(encoded: &[u8]) -> Result<Self> {
        let mut rest = encoded;
        let header = take(&mut rest, 32 + 4 + 2)?;
        let mut blinded_key = [0u8; 32];
        blinded_key.copy_from_slice(&header[..32]);
        let expiry_hours = u32::from_be_bytes([header[32], header[33], header[34], header[35]]);
        let sig_len = u16::from_be_bytes([header[36], header[37]]) as usize;
        if sig_len == 0 {
            return Err(DescError::BadCertificate(
                "cross-certificate signature is empty".into(),
            ));
        }
        let signature = take(&mut rest, sig_len)?.to_vec();
        if !rest.is_empty() {
            return Err(DescError::BadCertificate(
                "trailing bytes after cross-certificate signature".into(),
            ));
        }
        Ok(CrossCert {
            blinded_key,
            expiry_hours,
            signature,
            encoded: encoded.to_vec(),
        })
    }

    /// Validate against the legacy public key it must have been signed
    /// with and the blinded identity it must bind.
    pub fn validate(
        &self,
        legacy_key: &RsaPublicKey,
        expected_blinded: &[u8; 32],
        now: u64,
    ) -> Result<()> {
        if &self.blinded_key != expected_blinded {
            return Err(DescError::BadCertificate(
                "cross-certificate binds a different blinded key".into(),
            ));
        }
        if now >= self.expiry_epoch_secs() {
            return Err(DescError::Expired(
                "cross-certificate expiry is at or before the verification time".into(),
            ));
        }
        let digest = crosscert_digest(&self.blinded_key, self.expiry_hours);
        legacy_key
            .verify(Pkcs1v15Sign::new::<Sha256>(), &digest, &self.signature)
            .map_err(|_| {
                DescError::BadCertificate("cross-certificate signature failed verification".into())
            })
    }

    pub fn expiry_epoch_secs(&self) -> u64 {
        u64::from(self.expiry_hours) * 3600
    }

    pub fn encoded(&self) -> &[u8] {
        &self.encoded
    }
}

fn crosscert_digest(blinded_key: &[u8; 32], expiry_hours: u32) -> [u8; 32] {
    let mut h = Sha256::new();
    h.update(CROSSCERT_PREFIX);
    h.update(blinded_key);
    h.update(expiry_hours.to_be_bytes());
    h.finalize().into()
}

fn take<'a>(buf: &mut &'a [u8], n: usize) -> Result<&'a [u8]> {
    if buf.len() < n {
        return Err(DescError::BadCertificate(
            "certificate is truncated".into(),
        ));
    }
    let (head, tail) = buf.split_at(n);
    *buf = tail;
    Ok(head)
}
