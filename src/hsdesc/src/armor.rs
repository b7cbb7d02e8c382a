//! Armored Blocks and Base64 Tokens
//!
//! Binary objects inside a descriptor travel in PEM-like armor:
//!
//! ```text
//! -----BEGIN ED25519 CERT-----
//! <base64, `=`-padded, wrapped at 64 columns>
//! -----END ED25519 CERT-----
//! ```
//!
//! Inline tokens (link-specifier lists, curve25519 keys, the trailing
//! signature) use the standard alphabet without padding and without
//! newlines. Encoders and decoders must agree byte for byte, so both
//! directions are strict: the decoder rejects non-canonical padding and
//! mismatched header/footer kinds.

use base64::{
    engine::general_purpose::{STANDARD, STANDARD_NO_PAD},
    Engine as _,
};

use crate::{DescError, Result};

/// Column at which armored base64 is wrapped.
const ARMOR_WRAP: usize = 64;

pub(crate) const ARMOR_BEGIN: &str = "-----BEGIN ";
pub(crate) const ARMOR_END: &str = "-----END ";
pub(crate) const ARMOR_TAIL: &str = "-----";

/// Block kinds used by the descriptor grammar.
pub(crate) const KIND_ED25519_CERT: &str = "ED25519 CERT";
pub(crate) const KIND_MESSAGE: &str = "MESSAGE";
pub(crate) const KIND_RSA_PUBLIC_KEY: &str = "RSA PUBLIC KEY";
pub(crate) const KIND_CROSSCERT: &str = "CROSSCERT";

/// Armor `data` under the given block kind. The returned string contains
/// interior newlines but no trailing newline after the END line.
pub fn armor(kind: &str, data: &[u8]) -> String {
    let b64 = STANDARD.encode(data);
    let mut out = String::with_capacity(b64.len() + b64.len() / ARMOR_WRAP + kind.len() * 2 + 32);
    out.push_str(ARMOR_BEGIN);
    out.push_str(kind);
    out.push_str(ARMOR_TAIL);
    out.push('\n');
    for start in (0..b64.len()).step_by(ARMOR_WRAP) {
        out.push_str(&b64[start..b64.len().min(start + ARMOR_WRAP)]);
        out.push('\n');
    }
    out.push_str(ARMOR_END);
    out.push_str(kind);
    out.push_str(ARMOR_TAIL);
    out
}

/// Decode the concatenated payload lines of an armored block.
pub fn dearmor_payload(lines: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(lines)
        .map_err(|_| DescError::Malformed("armored block payload is not valid base64".into()))
}

/// Encode an inline token (no padding, no newlines).
pub fn b64_encode(data: &[u8]) -> String {
    STANDARD_NO_PAD.encode(data)
}

/// Decode an inline token. Padding characters are rejected.
pub fn b64_decode(token: &str) -> Result<Vec<u8>> {
    STANDARD_NO_PAD
        .decode(token)
        .map_err(|_| DescError::Malformed("token is not valid unpadded base64".into()))
}
