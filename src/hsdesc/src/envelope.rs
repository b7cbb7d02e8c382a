//! Crypto envelope for the encrypted section.
//!
//! The serialized inner document is zero-padded to a multiple of the
//! padding quantum (so the blob length reveals only a coarse bound on the
//! plaintext size), encrypted with AES-256-CTR, and authenticated with a
//! SHA3-256 MAC:
//!
//! ```text
//! secret_input = blinded_pubkey(32) | subcredential(32) | revision(8 BE)
//! keys         = SHAKE-256(secret_input | salt | "hsdir-encrypted-data")
//!              = aes_key(32) | iv(16) | mac_key(32)
//! mac          = SHA3-256(mac_key | salt | ciphertext)
//! blob         = salt(16) | ciphertext | mac(32)
//! ```
//!
//! An absent subcredential contributes an all-zero block, which is the
//! plain (non-client-authenticated) path. The MAC is checked in constant
//! time before any plaintext is interpreted, and every derived key is
//! zeroed on scope exit.

use aes::Aes256;
use ctr::cipher::{KeyIvInit, StreamCipher};
use rand::{CryptoRng, RngCore};
use sha3::{Sha3_256, Shake256};
use zeroize::{Zeroize, Zeroizing};

use crate::constant_time;
use crate::keys::Subcredential;
use crate::{DescError, Result};

type Aes256Ctr = ctr::Ctr128BE<Aes256>;

/// Salt prepended to every encrypted blob.
pub const SALT_LEN: usize = 16;
/// SHA3-256 MAC appended to every encrypted blob.
pub const MAC_LEN: usize = 32;
/// Plaintext is zero-padded to a multiple of this before encryption.
pub const PADDING_QUANTUM: usize = 10_000;
/// Upper bound on the padded plaintext; anything larger cannot fit the
/// descriptor length cap once armored.
pub const MAX_PADDED_PLAINTEXT_LEN: usize = 30_000;

const AES_KEY_LEN: usize = 32;
const AES_IV_LEN: usize = 16;
const MAC_KEY_LEN: usize = 32;
const KDF_OUT_LEN: usize = AES_KEY_LEN + AES_IV_LEN + MAC_KEY_LEN;

/// Domain-separation string fed to the KDF.
const KDF_CONTEXT: &[u8] = b"hsdir-encrypted-data";

/// True iff `len` could be the length of a well-formed encrypted blob:
/// salt and MAC plus a positive multiple of the padding quantum, within
/// the configured maximum.
pub fn encrypted_data_length_is_valid(len: usize) -> bool {
    let min = SALT_LEN + MAC_LEN + PADDING_QUANTUM;
    let max = SALT_LEN + MAC_LEN + MAX_PADDED_PLAINTEXT_LEN;
    len >= min && len <= max && (len - SALT_LEN - MAC_LEN) % PADDING_QUANTUM == 0
}

/// Padded length for a plaintext of `len` bytes: the smallest multiple of
/// the quantum that holds it.
pub fn padded_len(len: usize) -> usize {
    len.div_ceil(PADDING_QUANTUM) * PADDING_QUANTUM
}

/// Encrypt and authenticate the inner plaintext.
pub fn seal(
    plaintext: &[u8],
    blinded_key: &[u8; 32],
    subcredential: Option<&Subcredential>,
    revision_counter: u64,
    rng: &mut (impl RngCore + CryptoRng),
) -> Result<Vec<u8>> {
    let padded_total = padded_len(plaintext.len());
    if padded_total > MAX_PADDED_PLAINTEXT_LEN {
        return Err(DescError::TooLarge(
            "padded encrypted section exceeds its maximum length".into(),
        ));
    }

    let mut salt = [0u8; SALT_LEN];
    rng.fill_bytes(&mut salt);

    let keys = derive_keys(blinded_key, subcredential, revision_counter, &salt);

    let mut buffer = Zeroizing::new(vec![0u8; padded_total]);
    buffer[..plaintext.len()].copy_from_slice(plaintext);
    let mut cipher = new_cipher(&keys);
    cipher.apply_keystream(buffer.as_mut_slice());

    let mac = compute_mac(&keys[AES_KEY_LEN + AES_IV_LEN..], &salt, &buffer);

    let mut blob = Vec::with_capacity(SALT_LEN + padded_total + MAC_LEN);
    blob.extend_from_slice(&salt);
    blob.extend_from_slice(&buffer);
    blob.extend_from_slice(&mac);
    salt.zeroize();
    Ok(blob)
}

/// Authenticate and decrypt an encrypted blob. Returns the padded
/// plaintext; the caller strips padding at the grammar level.
pub fn open(
    blob: &[u8],
    blinded_key: &[u8; 32],
    subcredential: Option<&Subcredential>,
    revision_counter: u64,
) -> Result<Zeroizing<Vec<u8>>> {
    if blob.len() < SALT_LEN + MAC_LEN + PADDING_QUANTUM
        || (blob.len() - SALT_LEN - MAC_LEN) % PADDING_QUANTUM != 0
    {
        return Err(DescError::BadEnvelope(
            "encrypted blob length does not conform".into(),
        ));
    }
    if blob.len() > SALT_LEN + MAC_LEN + MAX_PADDED_PLAINTEXT_LEN {
        return Err(DescError::TooLarge(
            "encrypted blob exceeds the maximum padded length".into(),
        ));
    }

    let (salt, rest) = blob.split_at(SALT_LEN);
    let (ciphertext, mac) = rest.split_at(rest.len() - MAC_LEN);
    let salt: [u8; SALT_LEN] = salt.try_into().expect("split length is fixed");
    let mac: [u8; MAC_LEN] = mac.try_into().expect("split length is fixed");

    let keys = derive_keys(blinded_key, subcredential, revision_counter, &salt);

    let expected = compute_mac(&keys[AES_KEY_LEN + AES_IV_LEN..], &salt, ciphertext);
    if !constant_time::ct_eq_32(&expected, &mac) {
        return Err(DescError::BadEnvelope(
            "encrypted blob failed authentication".into(),
        ));
    }

    let mut buffer = Zeroizing::new(ciphertext.to_vec());
    let mut cipher = new_cipher(&keys);
    cipher.apply_keystream(buffer.as_mut_slice());
    Ok(buffer)
}

/// Strip the zero padding from decrypted plaintext. Every byte after the
/// first NUL must itself be zero.
pub fn strip_padding(padded: &[u8]) -> Result<&[u8]> {
    match padded.iter().position(|&b| b == 0) {
        None => Ok(padded),
        Some(end) => {
            if padded[end..].iter().any(|&b| b != 0) {
                return Err(DescError::Malformed(
                    "encrypted section padding is not zero".into(),
                ));
            }
            Ok(&padded[..end])
        }
    }
}

/// Set up the stream cipher from the first 48 bytes of KDF output.
fn new_cipher(keys: &[u8; KDF_OUT_LEN]) -> Aes256Ctr {
    Aes256Ctr::new_from_slices(
        &keys[..AES_KEY_LEN],
        &keys[AES_KEY_LEN..AES_KEY_LEN + AES_IV_LEN],
    )
    .expect("derived key and IV lengths are fixed")
}

/// SHAKE-256 key derivation over the secret input, salt, and context.
fn derive_keys(
    blinded_key: &[u8; 32],
    subcredential: Option<&Subcredential>,
    revision_counter: u64,
    salt: &[u8; SALT_LEN],
) -> Zeroizing<[u8; KDF_OUT_LEN]> {
    use sha3::digest::{ExtendableOutput, Update, XofReader};

    let mut secret_input = Zeroizing::new([0u8; 32 + 32 + 8]);
    secret_input[..32].copy_from_slice(blinded_key);
    if let Some(sub) = subcredential {
        secret_input[32..64].copy_from_slice(sub.as_bytes());
    }
    secret_input[64..].copy_from_slice(&revision_counter.to_be_bytes());

    let mut xof = Shake256::default();
    xof.update(&secret_input[..]);
    xof.update(salt);
    xof.update(KDF_CONTEXT);

    let mut keys = Zeroizing::new([0u8; KDF_OUT_LEN]);
    xof.finalize_xof().read(&mut keys[..]);
    keys
}

/// SHA3-256 over the MAC key, salt, and ciphertext, in that order.
fn compute_mac(mac_key: &[u8], salt: &[u8; SALT_LEN], ciphertext: &[u8]) -> [u8; MAC_LEN] {
    use sha3::Digest;

    debug_assert_eq!(mac_key.len(), MAC_KEY_LEN);
    let mut h = Sha3_256::new();
    h.update(mac_key);
    h.update(salt);
    h.update(ciphertext);
    h.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const BLINDED: [u8; 32] = [0x17; 32];
    const REVISION: u64 = 42;

    fn rng() -> StdRng {
        StdRng::from_seed([7u8; 32])
    }

    fn seal_simple(plaintext: &[u8]) -> Vec<u8> {
        seal(plaintext, &BLINDED, None, REVISION, &mut rng()).unwrap()
    }

    #[test]
    fn padded_len_follows_the_law() {
        assert_eq!(padded_len(0), 0);
        assert_eq!(padded_len(1), PADDING_QUANTUM);
        assert_eq!(padded_len(PADDING_QUANTUM - 1), PADDING_QUANTUM);
        assert_eq!(padded_len(PADDING_QUANTUM), PADDING_QUANTUM);
        assert_eq!(padded_len(PADDING_QUANTUM + 1), 2 * PADDING_QUANTUM);
        for len in [0usize, 1, 77, 9_999, 10_000, 10_001, 25_000] {
            let padded = padded_len(len);
            assert!(padded >= len);
            assert_eq!(padded % PADDING_QUANTUM, 0);
        }
    }

    #[test]
    fn seal_open_roundtrip() {
        let plaintext = b"create2-formats 2\n";
        let blob = seal_simple(plaintext);
        assert_eq!(blob.len(), SALT_LEN + PADDING_QUANTUM + MAC_LEN);

        let padded = open(&blob, &BLINDED, None, REVISION).unwrap();
        let recovered = strip_padding(&padded).unwrap();
        assert_eq!(recovered, plaintext);
    }

    #[test]
    fn padding_bytes_are_zero() {
        let plaintext = b"short";
        let blob = seal_simple(plaintext);
        let padded = open(&blob, &BLINDED, None, REVISION).unwrap();
        assert_eq!(&padded[..plaintext.len()], plaintext);
        assert!(padded[plaintext.len()..].iter().all(|&b| b == 0));
    }

    #[test]
    fn seal_is_deterministic_under_a_fixed_rng() {
        let plaintext = b"deterministic output";
        let a = seal_simple(plaintext);
        let b = seal_simple(plaintext);
        assert_eq!(a, b);
    }

    #[test]
    fn tampered_ciphertext_fails_authentication() {
        let mut blob = seal_simple(b"payload");
        let mid = blob.len() / 2;
        blob[mid] ^= 0x01;
        assert!(matches!(
            open(&blob, &BLINDED, None, REVISION),
            Err(DescError::BadEnvelope(_))
        ));
    }

    #[test]
    fn tampered_salt_fails_authentication() {
        let mut blob = seal_simple(b"payload");
        blob[0] ^= 0x01;
        assert!(matches!(
            open(&blob, &BLINDED, None, REVISION),
            Err(DescError::BadEnvelope(_))
        ));
    }

    #[test]
    fn wrong_blinded_key_fails_authentication() {
        let blob = seal_simple(b"payload");
        let wrong = [0x18; 32];
        assert!(open(&blob, &wrong, None, REVISION).is_err());
    }

    #[test]
    fn wrong_revision_fails_authentication() {
        let blob = seal_simple(b"payload");
        assert!(open(&blob, &BLINDED, None, REVISION + 1).is_err());
    }

    #[test]
    fn subcredential_changes_the_keys() {
        let sub = Subcredential::from_bytes([0x33; 32]);
        let blob = seal(b"payload", &BLINDED, Some(&sub), REVISION, &mut rng()).unwrap();
        assert!(open(&blob, &BLINDED, None, REVISION).is_err());
        assert!(open(&blob, &BLINDED, Some(&sub), REVISION).is_ok());
    }

    #[test]
    fn length_validity_law() {
        let min = SALT_LEN + MAC_LEN + PADDING_QUANTUM;
        assert!(encrypted_data_length_is_valid(min));
        assert!(encrypted_data_length_is_valid(min + PADDING_QUANTUM));
        assert!(encrypted_data_length_is_valid(
            SALT_LEN + MAC_LEN + MAX_PADDED_PLAINTEXT_LEN
        ));
        assert!(!encrypted_data_length_is_valid(0));
        assert!(!encrypted_data_length_is_valid(min - 1));
        assert!(!encrypted_data_length_is_valid(min + 1));
        assert!(!encrypted_data_length_is_valid(
            SALT_LEN + MAC_LEN + MAX_PADDED_PLAINTEXT_LEN + PADDING_QUANTUM
        ));
    }

    #[test]
    fn open_rejects_nonconforming_lengths() {
        assert!(matches!(
            open(&[0u8; 100], &BLINDED, None, REVISION),
            Err(DescError::BadEnvelope(_))
        ));
        let oversized = vec![0u8; SALT_LEN + MAC_LEN + MAX_PADDED_PLAINTEXT_LEN + PADDING_QUANTUM];
        assert!(matches!(
            open(&oversized, &BLINDED, None, REVISION),
            Err(DescError::TooLarge(_))
        ));
    }

    #[test]
    fn seal_rejects_oversized_plaintext() {
        let plaintext = vec![b'x'; MAX_PADDED_PLAINTEXT_LEN + 1];
        assert!(matches!(
            seal(&plaintext, &BLINDED, None, REVISION, &mut rng()),
            Err(DescError::TooLarge(_))
        ));
    }

    #[test]
    fn strip_padding_accepts_full_block() {
        let data = vec![b'a'; 8];
        assert_eq!(strip_padding(&data).unwrap(), &data[..]);
    }

    #[test]
    fn strip_padding_rejects_nonzero_padding() {
        let data = [b'a', 0, 0, b'x'];
        assert!(strip_padding(&data).is_err());
    }
}
