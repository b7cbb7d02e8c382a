//! Introduction-point record codec.
//!
//! Each record in the inner document has a fixed shape:
//!
//! ```text
//! introduction-point <base64 link-specifier list>
//! auth-key
//! <ED25519 CERT block, purpose: introduction-point auth key>
//! enc-key ntor <base64 curve25519 key>        | enc-key legacy
//!                                             | <RSA PUBLIC KEY block>
//! enc-key-certification
//! <ED25519 CERT block>                        | <CROSSCERT block>
//! ```
//!
//! A record missing a sub-directive, repeating one, or containing one this
//! implementation does not know fails as a whole; nothing is silently
//! dropped.

use rsa::pkcs1::{DecodeRsaPublicKey, EncodeRsaPublicKey};
use rsa::RsaPublicKey;

use crate::armor::{self, KIND_CROSSCERT, KIND_ED25519_CERT, KIND_RSA_PUBLIC_KEY};
use crate::cert::{Cert, CertKeyType, CertPurpose, CrossCert, CERT_LIFETIME_SECS};
use crate::doc::Item;
use crate::keys::{LegacyKeypair, SigningKeypair};
use crate::linkspec::{self, LinkSpec};
use crate::{DescError, Result};

/// The encryption key a client uses for its first contact, together with
/// the certificate binding it to the descriptor identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncKey {
    /// Curve25519 key for the ntor handshake, certified by the descriptor
    /// signing key.
    Ntor { key: [u8; 32], cert: Cert },
    /// RSA-1024 key kept for relays that predate the ntor handshake; the
    /// cross-certificate binds it to the blinded identity.
    Legacy {
        key: RsaPublicKey,
        crosscert: CrossCert,
    },
}

/// One introduction point as it appears in the inner document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntroPoint {
    pub link_specifiers: Vec<LinkSpec>,
    pub auth_key_cert: Cert,
    pub enc_key: EncKey,
}

impl IntroPoint {
    /// Build an ntor-keyed introduction point, issuing both certificates
    /// under the descriptor signing key.
    pub fn for_ntor(
        link_specifiers: Vec<LinkSpec>,
        auth_key: &[u8; 32],
        enc_key: &[u8; 32],
        signing_kp: &SigningKeypair,
        now: u64,
    ) -> Result<Self> {
        let auth_key_cert = Cert::create(
            CertPurpose::IntroAuth,
            CertKeyType::Ed25519,
            auth_key,
            signing_kp,
            now,
            CERT_LIFETIME_SECS,
        )?;
        let cert = Cert::create(
            CertPurpose::IntroEnc,
            CertKeyType::Curve25519,
            enc_key,
            signing_kp,
            now,
            CERT_LIFETIME_SECS,
        )?;
        Ok(Self {
            link_specifiers,
            auth_key_cert,
            enc_key: EncKey::Ntor {
                key: *enc_key,
                cert,
            },
        })
    }

    /// Build a legacy-keyed introduction point. The cross-certificate is
    /// issued by the legacy key itself over the blinded identity.
    pub fn for_legacy(
        link_specifiers: Vec<LinkSpec>,
        auth_key: &[u8; 32],
        legacy: &LegacyKeypair,
        signing_kp: &SigningKeypair,
        blinded_key: &[u8; 32],
        now: u64,
    ) -> Result<Self> {
        let auth_key_cert = Cert::create(
            CertPurpose::IntroAuth,
            CertKeyType::Ed25519,
            auth_key,
            signing_kp,
            now,
            CERT_LIFETIME_SECS,
        )?;
        let crosscert = CrossCert::create(legacy, blinded_key, now, CERT_LIFETIME_SECS)?;
        Ok(Self {
            link_specifiers,
            auth_key_cert,
            enc_key: EncKey::Legacy {
                key: legacy.public.clone(),
                crosscert,
            },
        })
    }

    /// Append this record's lines to the inner document.
    pub(crate) fn encode(&self, out: &mut String) -> Result<()> {
        let specs = linkspec::encode_list(&self.link_specifiers)?;
        out.push_str("introduction-point ");
        out.push_str(&armor::b64_encode(&specs));
        out.push('\n');

        out.push_str("auth-key\n");
        out.push_str(&armor::armor(KIND_ED25519_CERT, self.auth_key_cert.encoded()));
        out.push('\n');

        match &self.enc_key {
            EncKey::Ntor { key, cert } => {
                out.push_str("enc-key ntor ");
                out.push_str(&armor::b64_encode(key));
                out.push('\n');
                out.push_str("enc-key-certification\n");
                out.push_str(&armor::armor(KIND_ED25519_CERT, cert.encoded()));
                out.push('\n');
            }
            EncKey::Legacy { key, crosscert } => {
                let der = key.to_pkcs1_der().map_err(|e| {
                    DescError::InvalidKey(format!("legacy key cannot be DER-encoded: {e}"))
                })?;
                out.push_str("enc-key legacy\n");
                out.push_str(&armor::armor(KIND_RSA_PUBLIC_KEY, der.as_bytes()));
                out.push('\n');
                out.push_str("enc-key-certification\n");
                out.push_str(&armor::armor(KIND_CROSSCERT, crosscert.encoded()));
                out.push('\n');
            }
        }
        Ok(())
    }

    /// Decode one record from its tokenized items. Structure only; call
    /// [`validate`](Self::validate) with the descriptor context afterward.
    pub(crate) fn decode(items: &[Item<'_>]) -> Result<Self> {
        if items.len() != 4 {
            return Err(DescError::BadIntroPoint(
                "record does not have exactly its four directives".into(),
            ));
        }

        let ls_item = &items[0];
        debug_assert_eq!(ls_item.keyword, "introduction-point");
        ls_item.reject_object().map_err(reject)?;
        if ls_item.args.len() != 1 {
            return Err(DescError::BadIntroPoint(
                "introduction-point takes exactly one argument".into(),
            ));
        }
        let specs_bin = armor::b64_decode(ls_item.args[0]).map_err(reject)?;
        let link_specifiers = linkspec::decode_list(&specs_bin)?;

        let auth_item = &items[1];
        if auth_item.keyword != "auth-key" || !auth_item.args.is_empty() {
            return Err(DescError::BadIntroPoint(
                "auth-key directive is missing or malformed".into(),
            ));
        }
        let auth_key_cert = Cert::parse(object(auth_item, KIND_ED25519_CERT)?)?;

        let enc_item = &items[2];
        if enc_item.keyword != "enc-key" {
            return Err(DescError::BadIntroPoint(
                "enc-key directive is missing".into(),
            ));
        }
        let cert_item = &items[3];
        if cert_item.keyword != "enc-key-certification" || !cert_item.args.is_empty() {
            return Err(DescError::BadIntroPoint(
                "enc-key-certification directive is missing or malformed".into(),
            ));
        }

        let enc_key = match enc_item.args.first().copied() {
            Some("ntor") => {
                if enc_item.args.len() != 2 {
                    return Err(DescError::BadIntroPoint(
                        "ntor enc-key takes exactly one key argument".into(),
                    ));
                }
                enc_item.reject_object().map_err(reject)?;
                let key_bytes = armor::b64_decode(enc_item.args[1]).map_err(reject)?;
                let key: [u8; 32] = key_bytes.try_into().map_err(|_| {
                    DescError::BadIntroPoint("ntor enc-key is not 32 bytes".into())
                })?;
                let cert = Cert::parse(object(cert_item, KIND_ED25519_CERT)?)?;
                EncKey::Ntor { key, cert }
            }
            Some("legacy") => {
                if enc_item.args.len() != 1 {
                    return Err(DescError::BadIntroPoint(
                        "legacy enc-key takes no further arguments".into(),
                    ));
                }
                let der = object(enc_item, KIND_RSA_PUBLIC_KEY)?;
                let key = RsaPublicKey::from_pkcs1_der(der).map_err(|_| {
                    DescError::BadIntroPoint("legacy enc-key is not a valid RSA key".into())
                })?;
                let crosscert = CrossCert::parse(object(cert_item, KIND_CROSSCERT)?)?;
                EncKey::Legacy { key, crosscert }
            }
            Some(_) => {
                return Err(DescError::UnknownKeyType(
                    "enc-key variant is neither ntor nor legacy".into(),
                ))
            }
            None => {
                return Err(DescError::BadIntroPoint(
                    "enc-key directive has no variant tag".into(),
                ))
            }
        };

        Ok(Self {
            link_specifiers,
            auth_key_cert,
            enc_key,
        })
    }

    /// Check every certificate in this record against the descriptor
    /// context: the signing key that must have issued them, the blinded
    /// identity a legacy key must consent to, and the caller's clock.
    pub(crate) fn validate(
        &self,
        signing_key: &[u8; 32],
        blinded_key: &[u8; 32],
        now: u64,
    ) -> Result<()> {
        self.auth_key_cert
            .validate(CertPurpose::IntroAuth, Some(signing_key), now)?;

        match &self.enc_key {
            EncKey::Ntor { key, cert } => {
                cert.validate(CertPurpose::IntroEnc, Some(signing_key), now)?;
                if cert.key_type() != CertKeyType::Curve25519 || cert.certified_key() != key {
                    return Err(DescError::BadCertificate(
                        "enc-key certification does not bind the enc-key".into(),
                    ));
                }
            }
            EncKey::Legacy { key, crosscert } => {
                crosscert.validate(key, blinded_key, now)?;
            }
        }
        Ok(())
    }
}

/// Map a tokenizer-level error onto the record-level kind.
fn reject(err: DescError) -> DescError {
    match err {
        DescError::Malformed(msg) => DescError::BadIntroPoint(msg),
        other => other,
    }
}

fn object<'a>(item: &'a Item<'_>, kind: &str) -> Result<&'a [u8]> {
    item.object_of_kind(kind).map_err(reject)
}
