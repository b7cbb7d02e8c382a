//! Key material used by the descriptor codec.
//!
//! Wrappers around the primitives the codec needs and nothing more:
//! Ed25519 signing keypairs, the blinded per-period keypair they descend
//! from, curve25519 introduction-point encryption keys, legacy RSA-1024
//! encryption keys, and the client-side subcredential. Secret halves are
//! zeroed on drop.

use curve25519_dalek::{EdwardsPoint, Scalar};
use ed25519_dalek::hazmat::{raw_sign, ExpandedSecretKey};
use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::{CryptoRng, RngCore};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha512};
use sha3::Sha3_256;
use x25519_dalek::{PublicKey as X25519Public, StaticSecret as X25519Secret};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{DescError, Result};

/// Personalization for the blinding-factor hash.
const BLIND_STRING: &[u8] = b"Derive temporary signing key";
/// Nonce label mixed with the period parameters.
const BLIND_NONCE: &[u8] = b"key-blind";
/// Personalization for the blinded signing hash prefix.
const BLIND_PREFIX_STRING: &[u8] = b"Derive temporary signing key hash input";

/// Legacy RSA encryption keys are fixed at 1024 bits.
pub const LEGACY_KEY_BITS: usize = 1024;

/// Anything that can issue an Ed25519 signature over codec bytes: the
/// short-term descriptor signing keypair or the blinded identity keypair.
pub trait Ed25519Signer {
    /// Public key bytes of the signer.
    fn public_bytes(&self) -> [u8; 32];
    /// Sign `message` and return the raw 64-byte signature.
    fn sign(&self, message: &[u8]) -> [u8; 64];
}

/// Ed25519 keypair used to sign descriptors and embedded certificates.
pub struct SigningKeypair {
    pub signing: SigningKey,
    pub verifying: VerifyingKey,
}

impl SigningKeypair {
    /// Generate a fresh keypair from the caller's randomness source. The
    /// crate never reaches for an RNG of its own, so a seeded source
    /// reproduces the same keypair.
    pub fn generate(rng: &mut (impl RngCore + CryptoRng)) -> Self {
        let signing = SigningKey::generate(rng);
        let verifying = signing.verifying_key();
        Self { signing, verifying }
    }

    pub fn from_secret_bytes(bytes: &[u8; 32]) -> Result<Self> {
        let signing = SigningKey::from_bytes(bytes);
        let verifying = signing.verifying_key();
        Ok(Self { signing, verifying })
    }

    pub fn secret_bytes(&self) -> [u8; 32] {
        self.signing.to_bytes()
    }

    pub fn public_bytes(&self) -> [u8; 32] {
        self.verifying.to_bytes()
    }

    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        use ed25519_dalek::Signer;
        self.signing.sign(message).to_bytes()
    }
}

impl Ed25519Signer for SigningKeypair {
    fn public_bytes(&self) -> [u8; 32] {
        SigningKeypair::public_bytes(self)
    }

    fn sign(&self, message: &[u8]) -> [u8; 64] {
        SigningKeypair::sign(self, message)
    }
}

/// Blinded per-period Ed25519 keypair.
///
/// The descriptor is signed under this identity so directory servers
/// cannot link one publication period to the next. The secret half is an
/// expanded scalar rather than a seed, so signing goes through the
/// expanded-key path.
pub struct BlindedKeypair {
    scalar: Scalar,
    hash_prefix: [u8; 32],
    verifying: VerifyingKey,
}

impl BlindedKeypair {
    /// Derive the blinded keypair for one period from the long-term
    /// identity keypair.
    ///
    /// The blinding factor is a clamped SHA3-256 digest of the identity
    /// public key and the period parameters; the blinded secret scalar is
    /// the product of the factor and the identity scalar, and the signing
    /// hash prefix is re-derived so blinded signatures cannot be related
    /// to identity signatures.
    pub fn derive(identity: &SigningKeypair, period_num: u64, period_len: u64) -> Result<Self> {
        let mut seed = identity.signing.to_bytes();
        let expanded = ExpandedSecretKey::from(&seed);
        seed.zeroize();

        let mut h = Sha3_256::new();
        h.update(BLIND_STRING);
        h.update([0u8]);
        h.update(identity.verifying.as_bytes());
        h.update(BLIND_NONCE);
        h.update(period_num.to_be_bytes());
        h.update(period_len.to_be_bytes());
        let mut factor: [u8; 32] = h.finalize().into();
        factor[0] &= 248;
        factor[31] &= 63;
        factor[31] |= 64;

        let blind = Scalar::from_bytes_mod_order(factor);
        factor.zeroize();
        let scalar = blind * expanded.scalar;
        let point = EdwardsPoint::mul_base(&scalar);
        let verifying = VerifyingKey::from_bytes(&point.compress().to_bytes())
            .map_err(|_| DescError::InvalidKey("blinded public key is not canonical".into()))?;

        let mut prefix_hash = Sha512::new();
        prefix_hash.update(BLIND_PREFIX_STRING);
        prefix_hash.update(expanded.hash_prefix);
        let digest = prefix_hash.finalize();
        let mut hash_prefix = [0u8; 32];
        hash_prefix.copy_from_slice(&digest[..32]);

        Ok(Self {
            scalar,
            hash_prefix,
            verifying,
        })
    }

    /// Generate an independent blinded keypair. Fixture-building helper:
    /// the publisher pipeline always uses [`derive`](Self::derive).
    pub fn generate(rng: &mut (impl RngCore + CryptoRng)) -> Self {
        let signing = SigningKey::generate(rng);
        let mut seed = signing.to_bytes();
        let expanded = ExpandedSecretKey::from(&seed);
        seed.zeroize();
        Self {
            scalar: expanded.scalar,
            hash_prefix: expanded.hash_prefix,
            verifying: signing.verifying_key(),
        }
    }

    pub fn public_bytes(&self) -> [u8; 32] {
        self.verifying.to_bytes()
    }

    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        let expanded = ExpandedSecretKey {
            scalar: self.scalar,
            hash_prefix: self.hash_prefix,
        };
        raw_sign::<Sha512>(&expanded, message, &self.verifying).to_bytes()
    }
}

impl Ed25519Signer for BlindedKeypair {
    fn public_bytes(&self) -> [u8; 32] {
        BlindedKeypair::public_bytes(self)
    }

    fn sign(&self, message: &[u8]) -> [u8; 64] {
        BlindedKeypair::sign(self, message)
    }
}

impl Drop for BlindedKeypair {
    fn drop(&mut self) {
        self.scalar.zeroize();
        self.hash_prefix.zeroize();
    }
}

/// Curve25519 keypair for the `ntor` introduction-point encryption key.
#[derive(Clone)]
pub struct EncKeypair {
    pub secret: X25519Secret,
    pub public: X25519Public,
}

impl EncKeypair {
    pub fn generate(rng: &mut (impl RngCore + CryptoRng)) -> Self {
        let secret = X25519Secret::random_from_rng(rng);
        let public = X25519Public::from(&secret);
        Self { secret, public }
    }

    pub fn from_secret_bytes(bytes: &[u8; 32]) -> Self {
        let secret = X25519Secret::from(*bytes);
        let public = X25519Public::from(&secret);
        Self { secret, public }
    }

    pub fn public_bytes(&self) -> [u8; 32] {
        self.public.to_bytes()
    }
}

/// RSA-1024 keypair for the `legacy` introduction-point encryption key.
///
/// Tolerated only while legacy-key relays remain in service; the secret
/// half exists so the cross-certificate binding it to the blinded identity
/// can be issued.
pub struct LegacyKeypair {
    pub secret: RsaPrivateKey,
    pub public: RsaPublicKey,
}

impl LegacyKeypair {
    pub fn generate(rng: &mut (impl RngCore + CryptoRng)) -> Result<Self> {
        let secret = RsaPrivateKey::new(rng, LEGACY_KEY_BITS)
            .map_err(|e| DescError::InvalidKey(format!("RSA key generation failed: {e}")))?;
        let public = secret.to_public_key();
        Ok(Self { secret, public })
    }
}

/// Per-period client-side secret mixed into the envelope KDF.
///
/// Absent on the plain (non-client-authenticated) path; the KDF then uses
/// an all-zero block in its place so both sides agree.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Subcredential([u8; 32]);

impl Subcredential {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}
