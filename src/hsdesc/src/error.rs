//! Error types for descriptor encoding and decoding.
//!
//! All codec operations return [`Result<T>`] which wraps [`DescError`].
//! Error payloads name the rule that was violated; they never echo bytes
//! of the untrusted input.

use thiserror::Error;

/// Error type for all descriptor operations.
///
/// Any error aborts the whole encode or decode; no partially populated
/// descriptor is ever handed back alongside one of these.
#[derive(Debug, Error)]
pub enum DescError {
    /// Grammar violation: tokenizer, integer range, directive ordering,
    /// or armored-block framing.
    #[error("malformed descriptor: {0}")]
    Malformed(String),

    /// Descriptor format version outside the supported range.
    #[error("unsupported descriptor format version {0}")]
    UnsupportedVersion(u32),

    /// Input document or decrypted plaintext beyond the configured maximum.
    #[error("descriptor too large: {0}")]
    TooLarge(String),

    /// Ed25519 signature over the descriptor body failed verification.
    #[error("bad descriptor signature: {0}")]
    BadSignature(String),

    /// An embedded certificate has the wrong purpose, lacks the signing-key
    /// extension, binds the wrong subject, or fails signature verification.
    #[error("bad certificate: {0}")]
    BadCertificate(String),

    /// A certificate's expiry lies at or before the caller-supplied clock.
    #[error("expired certificate: {0}")]
    Expired(String),

    /// Encrypted-section failure: MAC mismatch, or a salt/length layout
    /// that does not conform.
    #[error("bad encrypted envelope: {0}")]
    BadEnvelope(String),

    /// A specific introduction-point record is invalid. Records are never
    /// silently dropped; this fails the whole descriptor.
    #[error("bad introduction point: {0}")]
    BadIntroPoint(String),

    /// An `enc-key` variant tag that is neither `ntor` nor `legacy`.
    #[error("unknown encryption key type: {0}")]
    UnknownKeyType(String),

    /// Key material handed to the primitive layer is unusable: wrong
    /// length, non-canonical encoding, or a failed key generation.
    #[error("invalid key material: {0}")]
    InvalidKey(String),
}

/// Result type alias for descriptor operations.
pub type Result<T> = std::result::Result<T, DescError>;
