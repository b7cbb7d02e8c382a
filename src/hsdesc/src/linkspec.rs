//! Link-specifier codec.
//!
//! A link specifier describes one way to reach an introduction-point
//! relay. The list travels base64-encoded inside the `introduction-point`
//! directive; the binary sub-format is length-prefixed:
//!
//! ```text
//! n : u8                    number of specifiers
//! n times:
//!   type : u8
//!   len  : u8
//!   val  : len bytes
//! ```
//!
//! Unknown types are preserved byte for byte so a relay can introduce new
//! specifier kinds without breaking older parsers; they are opaque to
//! validation. Duplicate specifiers of the same known type within one
//! record are rejected.

use std::net::{Ipv4Addr, Ipv6Addr};

use crate::{DescError, Result};

/// TLS-over-TCP, IPv4 address and port.
pub const LS_IPV4: u8 = 0;
/// TLS-over-TCP, IPv6 address and port.
pub const LS_IPV6: u8 = 1;
/// Legacy relay identity, a 20-byte fingerprint.
pub const LS_LEGACY_ID: u8 = 2;

/// One way to reach a relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkSpec {
    Ipv4 { addr: Ipv4Addr, port: u16 },
    Ipv6 { addr: Ipv6Addr, port: u16 },
    LegacyId([u8; 20]),
    /// A specifier type this implementation does not recognize. Kept
    /// opaque so it survives a round-trip unchanged.
    Unknown { ls_type: u8, payload: Vec<u8> },
}

impl LinkSpec {
    pub fn ls_type(&self) -> u8 {
        match self {
            LinkSpec::Ipv4 { .. } => LS_IPV4,
            LinkSpec::Ipv6 { .. } => LS_IPV6,
            LinkSpec::LegacyId(_) => LS_LEGACY_ID,
            LinkSpec::Unknown { ls_type, .. } => *ls_type,
        }
    }
}

/// Check the list-level rules shared by both directions: at least one
/// specifier, at most 255, no duplicate known types.
fn check_list(specs: &[LinkSpec]) -> Result<()> {
    if specs.is_empty() {
        return Err(DescError::BadIntroPoint(
            "introduction point has no link specifiers".into(),
        ));
    }
    if specs.len() > u8::MAX as usize {
        return Err(DescError::BadIntroPoint(
            "too many link specifiers for one introduction point".into(),
        ));
    }
    let mut seen = [false; 3];
    for spec in specs {
        match spec {
            LinkSpec::Unknown { ls_type, .. } => {
                if *ls_type <= LS_LEGACY_ID {
                    return Err(DescError::BadIntroPoint(
                        "opaque link specifier uses a recognized type tag".into(),
                    ));
                }
            }
            known => {
                let slot = &mut seen[known.ls_type() as usize];
                if *slot {
                    return Err(DescError::BadIntroPoint(
                        "duplicate link specifier type".into(),
                    ));
                }
                *slot = true;
            }
        }
    }
    Ok(())
}

/// Encode a link-specifier list to its binary form.
pub(crate) fn encode_list(specs: &[LinkSpec]) -> Result<Vec<u8>> {
    check_list(specs)?;
    let mut out = Vec::with_capacity(1 + specs.len() * 8);
    out.push(specs.len() as u8);
    for spec in specs {
        match spec {
            LinkSpec::Ipv4 { addr, port } => {
                out.push(LS_IPV4);
                out.push(6);
                out.extend_from_slice(&addr.octets());
                out.extend_from_slice(&port.to_be_bytes());
            }
            LinkSpec::Ipv6 { addr, port } => {
                out.push(LS_IPV6);
                out.push(18);
                out.extend_from_slice(&addr.octets());
                out.extend_from_slice(&port.to_be_bytes());
            }
            LinkSpec::LegacyId(id) => {
                out.push(LS_LEGACY_ID);
                out.push(20);
                out.extend_from_slice(id);
            }
            LinkSpec::Unknown { ls_type, payload } => {
                let len: u8 = payload.len().try_into().map_err(|_| {
                    DescError::BadIntroPoint("link specifier payload is too long".into())
                })?;
                out.push(*ls_type);
                out.push(len);
                out.extend_from_slice(payload);
            }
        }
    }
    Ok(out)
}

/// Decode a link-specifier list from its binary form. The whole buffer
/// must be consumed.
pub(crate) fn decode_list(bytes: &[u8]) -> Result<Vec<LinkSpec>> {
    let mut rest = bytes;
    let n = *take(&mut rest, 1)?.first().unwrap_or(&0);
    let mut specs = Vec::with_capacity(n as usize);
    for _ in 0..n {
        let header = take(&mut rest, 2)?;
        let ls_type = header[0];
        let len = header[1] as usize;
        let val = take(&mut rest, len)?;
        let spec = match ls_type {
            LS_IPV4 => {
                if len != 6 {
                    return Err(DescError::BadIntroPoint(
                        "IPv4 link specifier has the wrong length".into(),
                    ));
                }
                LinkSpec::Ipv4 {
                    addr: Ipv4Addr::new(val[0], val[1], val[2], val[3]),
                    port: u16::from_be_bytes([val[4], val[5]]),
                }
            }
            LS_IPV6 => {
                if len != 18 {
                    return Err(DescError::BadIntroPoint(
                        "IPv6 link specifier has the wrong length".into(),
                    ));
                }
                let mut octets = [0u8; 16];
                octets.copy_from_slice(&val[..16]);
                LinkSpec::Ipv6 {
                    addr: Ipv6Addr::from(octets),
                    port: u16::from_be_bytes([val[16], val[17]]),
                }
            }
            LS_LEGACY_ID => {
                if len != 20 {
                    return Err(DescError::BadIntroPoint(
                        "legacy-identity link specifier has the wrong length".into(),
                    ));
                }
                let mut id = [0u8; 20];
                id.copy_from_slice(val);
                LinkSpec::LegacyId(id)
            }
            _ => LinkSpec::Unknown {
                ls_type,
                payload: val.to_vec(),
            },
        };
        specs.push(spec);
    }
    if !rest.is_empty() {
        return Err(DescError::BadIntroPoint(
            "trailing bytes after link specifier list".into(),
        ));
    }
    check_list(&specs)?;
    Ok(specs)
}

fn take<'a>(buf: &mut &'a [u8], n: usize) -> Result<&'a [u8]> {
    if buf.len() < n {
        return Err(DescError::BadIntroPoint(
            "link specifier list is truncated".into(),
        ));
    }
    let (head, tail) = buf.split_at(n);
    *buf = tail;
    Ok(head)
}
