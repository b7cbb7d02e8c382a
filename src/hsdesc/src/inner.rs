//! Inner (encrypted-section) document codec.
//!
//! The plaintext that lives inside the encrypted blob:
//!
//! ```text
//! create2-formats <space-separated handshake identifiers>
//! authentication-required <space-separated tokens>     (optional)
//! <introduction-point records...>                      (possibly none)
//! ```
//!
//! The two header directives may appear in either order but must precede
//! every introduction-point record. Record order is significant and
//! preserved on round-trip. Unknown header directives reject the
//! document.

use crate::doc;
use crate::intro::IntroPoint;
use crate::{DescError, Result};

/// Handshake identifier for ntor, the only one currently assigned.
pub const HANDSHAKE_NTOR: u32 = 2;

/// The decrypted interior of a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InnerDoc {
    /// Accepted create-handshake identifiers. Never empty.
    pub create2_formats: Vec<u32>,
    /// Authentication schemes a client must support, empty when the
    /// service imposes none.
    pub auth_types: Vec<String>,
    /// Introduction points in publication order.
    pub intro_points: Vec<IntroPoint>,
}

impl InnerDoc {
    /// A document accepting the ntor handshake with no introduction
    /// points yet.
    pub fn new() -> Self {
        Self {
            create2_formats: vec![HANDSHAKE_NTOR],
            auth_types: Vec::new(),
            intro_points: Vec::new(),
        }
    }

    /// Serialize to the plaintext that will be encrypted.
    pub(crate) fn encode(&self) -> Result<String> {
        if self.create2_formats.is_empty() {
            return Err(DescError::Malformed(
                "create2-formats list must not be empty".into(),
            ));
        }
        let mut out = String::new();
        out.push_str("create2-formats");
        for format in &self.create2_formats {
            out.push(' ');
            out.push_str(&format.to_string());
        }
        out.push('\n');

        if !self.auth_types.is_empty() {
            out.push_str("authentication-required");
            for token in &self.auth_types {
                if token.is_empty() || !token.bytes().all(|b| b.is_ascii_graphic()) {
                    return Err(DescError::Malformed(
                        "authentication-required token is not printable".into(),
                    ));
                }
                out.push(' ');
                out.push_str(token);
            }
            out.push('\n');
        }

        for ip in &self.intro_points {
            ip.encode(&mut out)?;
        }
        Ok(out)
    }

    /// Parse and fully validate the decrypted plaintext. `signing_key` and
    /// `blinded_key` are the descriptor context every record's
    /// certificates must chain to.
    pub(crate) fn decode(
        text: &str,
        signing_key: &[u8; 32],
        blinded_key: &[u8; 32],
        now: u64,
    ) -> Result<Self> {
        let items = doc::tokenize(text)?;

        let mut create2_formats: Option<Vec<u32>> = None;
        let mut auth_types: Option<Vec<String>> = None;
        let mut first_record = items.len();

        for (index, item) in items.iter().enumerate() {
            match item.keyword {
                "create2-formats" => {
                    item.reject_object()?;
                    if create2_formats.is_some() {
                        return Err(DescError::Malformed(
                            "duplicate create2-formats directive".into(),
                        ));
                    }
                    if item.args.is_empty() {
                        return Err(DescError::Malformed(
                            "create2-formats list must not be empty".into(),
                        ));
                    }
                    let mut formats = Vec::with_capacity(item.args.len());
                    for arg in &item.args {
                        let value = doc::parse_uint(arg)?;
                        let value: u32 = value.try_into().map_err(|_| {
                            DescError::Malformed("create2 format identifier is too large".into())
                        })?;
                        formats.push(value);
                    }
                    create2_formats = Some(formats);
                }
                "authentication-required" => {
                    item.reject_object()?;
                    if auth_types.is_some() {
                        return Err(DescError::Malformed(
                            "duplicate authentication-required directive".into(),
                        ));
                    }
                    if item.args.is_empty() {
                        return Err(DescError::Malformed(
                            "authentication-required list must not be empty".into(),
                        ));
                    }
                    auth_types = Some(item.args.iter().map(|a| a.to_string()).collect());
                }
                "introduction-point" => {
                    first_record = index;
                    break;
                }
                _ => {
                    return Err(DescError::Malformed(
                        "unknown directive in the encrypted section".into(),
                    ));
                }
            }
        }

        let create2_formats = create2_formats.ok_or_else(|| {
            DescError::Malformed("encrypted section lacks create2-formats".into())
        })?;

        let mut intro_points = Vec::new();
        let mut cursor = first_record;
        while cursor < items.len() {
            let end = items[cursor + 1..]
                .iter()
                .position(|item| item.keyword == "introduction-point")
                .map(|i| cursor + 1 + i)
                .unwrap_or(items.len());
            let ip = IntroPoint::decode(&items[cursor..end])?;
            ip.validate(signing_key, blinded_key, now)?;
            intro_points.push(ip);
            cursor = end;
        }

        Ok(Self {
            create2_formats,
            auth_types: auth_types.unwrap_or_default(),
            intro_points,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{EncKeypair, SigningKeypair};
    use crate::linkspec::LinkSpec;
    use rand::rngs::OsRng;
    use std::net::Ipv4Addr;

    const NOW: u64 = 1_500_000_000;

    fn context() -> (SigningKeypair, [u8; 32]) {
        (SigningKeypair::generate(&mut OsRng), [0x42; 32])
    }

    fn sample_point(signing_kp: &SigningKeypair) -> IntroPoint {
        let auth = SigningKeypair::generate(&mut OsRng);
        let enc = EncKeypair::generate(&mut OsRng);
        IntroPoint::for_ntor(
            vec![LinkSpec::Ipv4 {
                addr: Ipv4Addr::new(10, 0, 0, 1),
                port: 443,
            }],
            &auth.public_bytes(),
            &enc.public_bytes(),
            signing_kp,
            NOW,
        )
        .unwrap()
    }

    #[test]
    fn empty_document_roundtrip() {
        let (signing_kp, blinded) = context();
        let doc = InnerDoc::new();
        let text = doc.encode().unwrap();
        assert_eq!(text, "create2-formats 2\n");

        let decoded =
            InnerDoc::decode(&text, &signing_kp.public_bytes(), &blinded, NOW).unwrap();
        assert_eq!(decoded, doc);
        assert!(decoded.intro_points.is_empty());
        assert!(!decoded.create2_formats.is_empty());
    }

    #[test]
    fn auth_types_roundtrip() {
        let (signing_kp, blinded) = context();
        let mut doc = InnerDoc::new();
        doc.auth_types = vec!["ed25519".into(), "password".into()];
        let text = doc.encode().unwrap();
        assert!(text.contains("authentication-required ed25519 password\n"));

        let decoded =
            InnerDoc::decode(&text, &signing_kp.public_bytes(), &blinded, NOW).unwrap();
        assert_eq!(decoded.auth_types, doc.auth_types);
    }

    #[test]
    fn records_preserve_order() {
        let (signing_kp, blinded) = context();
        let mut doc = InnerDoc::new();
        doc.intro_points = vec![sample_point(&signing_kp), sample_point(&signing_kp)];
        let text = doc.encode().unwrap();

        let decoded =
            InnerDoc::decode(&text, &signing_kp.public_bytes(), &blinded, NOW + 60).unwrap();
        assert_eq!(decoded.intro_points, doc.intro_points);
    }

    #[test]
    fn header_order_is_flexible() {
        let (signing_kp, blinded) = context();
        let text = "authentication-required ed25519\ncreate2-formats 2\n";
        let decoded =
            InnerDoc::decode(text, &signing_kp.public_bytes(), &blinded, NOW).unwrap();
        assert_eq!(decoded.create2_formats, vec![HANDSHAKE_NTOR]);
        assert_eq!(decoded.auth_types, vec!["ed25519".to_string()]);
    }

    #[test]
    fn missing_create2_formats_is_rejected() {
        let (signing_kp, blinded) = context();
        let err = InnerDoc::decode(
            "authentication-required ed25519\n",
            &signing_kp.public_bytes(),
            &blinded,
            NOW,
        )
        .unwrap_err();
        assert!(matches!(err, DescError::Malformed(_)));
    }

    #[test]
    fn unknown_header_directive_is_rejected() {
        let (signing_kp, blinded) = context();
        let err = InnerDoc::decode(
            "create2-formats 2\nfancy-extension 1\n",
            &signing_kp.public_bytes(),
            &blinded,
            NOW,
        )
        .unwrap_err();
        assert!(matches!(err, DescError::Malformed(_)));
    }

    #[test]
    fn duplicate_header_is_rejected() {
        let (signing_kp, blinded) = context();
        let err = InnerDoc::decode(
            "create2-formats 2\ncreate2-formats 2\n",
            &signing_kp.public_bytes(),
            &blinded,
            NOW,
        )
        .unwrap_err();
        assert!(matches!(err, DescError::Malformed(_)));
    }

    #[test]
    fn header_after_record_is_rejected() {
        let (signing_kp, blinded) = context();
        let mut doc = InnerDoc::new();
        doc.intro_points = vec![sample_point(&signing_kp)];
        let mut text = doc.encode().unwrap();
        text.push_str("authentication-required ed25519\n");

        let err = InnerDoc::decode(&text, &signing_kp.public_bytes(), &blinded, NOW + 60)
            .unwrap_err();
        assert!(matches!(err, DescError::BadIntroPoint(_)));
    }

    #[test]
    fn expired_record_certificate_fails_decode() {
        let (signing_kp, blinded) = context();
        let mut doc = InnerDoc::new();
        doc.intro_points = vec![sample_point(&signing_kp)];
        let text = doc.encode().unwrap();

        let late = NOW + 48 * 60 * 60;
        let err = InnerDoc::decode(&text, &signing_kp.public_bytes(), &blinded, late)
            .unwrap_err();
        assert!(matches!(err, DescError::Expired(_)));
    }
}
