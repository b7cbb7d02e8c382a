//! Constant-Time Comparisons
//!
//! The envelope MAC and certificate digests are compared with the `subtle`
//! crate so the comparison time is independent of where the first
//! mismatching byte occurs.

use subtle::ConstantTimeEq;

/// Constant-time comparison of two byte slices.
///
/// The length check itself is not constant time; use this only where the
/// lengths are public (both MAC and digest lengths are fixed by the wire
/// format).
#[inline]
pub fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Constant-time comparison of two 32-byte values (MACs, key digests).
#[inline]
pub fn ct_eq_32(a: &[u8; 32], b: &[u8; 32]) -> bool {
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eq_32_matches() {
        let a = [7u8; 32];
        let b = [7u8; 32];
        assert!(ct_eq_32(&a, &b));
    }

    #[test]
    fn eq_32_detects_single_byte_difference() {
        let a = [7u8; 32];
        let mut b = [7u8; 32];
        b[31] ^= 0x01;
        assert!(!ct_eq_32(&a, &b));
    }

    #[test]
    fn eq_rejects_length_mismatch() {
        assert!(!ct_eq(b"abc", b"abcd"));
        assert!(ct_eq(b"abc", b"abc"));
    }
}
