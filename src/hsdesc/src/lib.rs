//! # hsdesc
//!
//! Encoding, decoding, and validation of onion-service descriptors: the
//! signed-and-encrypted documents through which a client learns how to
//! rendezvous with a hidden service.
//!
//! ## Features
//!
//! - **Two-layer codec**: a signed plaintext envelope around an encrypted
//!   inner section holding the introduction-point records
//! - **Certificate chain**: short-lived Ed25519 certificates binding the
//!   signing, authentication, and encryption keys to the blinded identity
//! - **Adversarial-input decoding**: strict grammar, constant-time MAC
//!   checks, no partial results on failure
//! - **Deterministic encoding**: identical input and randomness produce
//!   byte-identical output
//! - **Secret hygiene**: key material zeroized on drop on every path
//!
//! The codec is synchronous and stateless: it performs no I/O, reads no
//! clock, and holds no globals. The caller injects a `now` timestamp and
//! a randomness source per call, so concurrent encodes and decodes on
//! different inputs need no coordination.
//!
//! ## Example
//!
//! ```no_run
//! use hsdesc::{
//!     decode_descriptor, encode_descriptor, BlindedKeypair, Descriptor, InnerDoc,
//!     SigningKeypair,
//! };
//! use rand::rngs::OsRng;
//!
//! let now = 1_700_000_000;
//! let identity = SigningKeypair::generate(&mut OsRng);
//! let blinded = BlindedKeypair::derive(&identity, 1234, 1440).unwrap();
//! let signing = SigningKeypair::generate(&mut OsRng);
//!
//! let desc = Descriptor::create(signing, blinded, 180, 1, InnerDoc::new(), now).unwrap();
//! let text = encode_descriptor(&desc, &mut OsRng).unwrap();
//!
//! let decoded = decode_descriptor(&text, None, now).unwrap();
//! assert_eq!(decoded.revision_counter, 1);
//! ```

pub mod armor;
pub mod cert;
pub mod constant_time;
pub mod desc;
mod doc;
pub mod envelope;
pub mod error;
pub mod inner;
pub mod intro;
pub mod keys;
pub mod linkspec;

pub use cert::{Cert, CertKeyType, CertPurpose, CrossCert};
pub use desc::{
    decode_descriptor, encode_descriptor, is_supported_version, DecodedDescriptor, Descriptor,
    MAX_DESCRIPTOR_LEN, MAX_LIFETIME_MINUTES, VERSION_MAX, VERSION_MIN,
};
pub use envelope::{encrypted_data_length_is_valid, MAX_PADDED_PLAINTEXT_LEN, PADDING_QUANTUM};
pub use error::{DescError, Result};
pub use inner::{InnerDoc, HANDSHAKE_NTOR};
pub use intro::{EncKey, IntroPoint};
pub use keys::{
    BlindedKeypair, Ed25519Signer, EncKeypair, LegacyKeypair, SigningKeypair, Subcredential,
};
pub use linkspec::LinkSpec;
