//! Line-oriented document tokenizer.
//!
//! Both descriptor layers share one grammar: a sequence of items, where an
//! item is a directive line (`keyword [arg ...]`, single spaces, `\n`
//! terminated) optionally followed by one armored object. The tokenizer
//! turns a document into items, keeps the byte offset of each directive
//! line so the outer codec can reconstruct the signed range exactly, and
//! rejects everything the encoders cannot produce: empty lines, stray
//! whitespace, carriage returns, objects without a directive, mismatched
//! armor footers, or a missing final newline.

use crate::armor::{self, ARMOR_BEGIN, ARMOR_END, ARMOR_TAIL};
use crate::{DescError, Result};

/// One directive with its arguments and optional armored object.
#[derive(Debug)]
pub(crate) struct Item<'a> {
    pub keyword: &'a str,
    pub args: Vec<&'a str>,
    pub object: Option<Object>,
    /// Byte offset of the directive line within the document.
    pub offset: usize,
}

impl Item<'_> {
    /// The object, required to be present and of the given kind.
    pub fn object_of_kind(&self, kind: &str) -> Result<&[u8]> {
        match &self.object {
            Some(obj) if obj.kind == kind => Ok(&obj.data),
            Some(_) => Err(DescError::Malformed(format!(
                "directive `{}` carries the wrong armored block kind",
                self.keyword
            ))),
            None => Err(DescError::Malformed(format!(
                "directive `{}` is missing its armored block",
                self.keyword
            ))),
        }
    }

    /// Reject any attached object.
    pub fn reject_object(&self) -> Result<()> {
        if self.object.is_some() {
            return Err(DescError::Malformed(format!(
                "directive `{}` does not take an armored block",
                self.keyword
            )));
        }
        Ok(())
    }
}

/// A decoded armored object together with its block kind.
#[derive(Debug)]
pub(crate) struct Object {
    pub kind: String,
    pub data: Vec<u8>,
}

struct Lines<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Lines<'a> {
    fn next(&mut self) -> Option<(usize, &'a str)> {
        if self.pos >= self.text.len() {
            return None;
        }
        // The caller has checked for a final newline, so this always finds one.
        let end = self.text[self.pos..].find('\n').map(|i| self.pos + i)?;
        let line = &self.text[self.pos..end];
        let offset = self.pos;
        self.pos = end + 1;
        Some((offset, line))
    }
}

/// Tokenize a descriptor-layer document into items.
pub(crate) fn tokenize(text: &str) -> Result<Vec<Item<'_>>> {
    if text.is_empty() || !text.ends_with('\n') {
        return Err(DescError::Malformed(
            "document does not end with a newline".into(),
        ));
    }

    let mut lines = Lines { text, pos: 0 };
    let mut items: Vec<Item<'_>> = Vec::new();

    while let Some((offset, line)) = lines.next() {
        if let Some(rest) = line.strip_prefix(ARMOR_BEGIN) {
            let kind = parse_armor_kind(rest)?;
            let last = items.last_mut().ok_or_else(|| {
                DescError::Malformed("armored block precedes any directive".into())
            })?;
            if last.object.is_some() {
                return Err(DescError::Malformed(
                    "directive carries more than one armored block".into(),
                ));
            }
            last.object = Some(read_object(&mut lines, kind)?);
        } else {
            items.push(parse_directive(offset, line)?);
        }
    }

    if items.is_empty() {
        return Err(DescError::Malformed("document contains no directives".into()));
    }
    Ok(items)
}

fn parse_directive<'a>(offset: usize, line: &'a str) -> Result<Item<'a>> {
    if line.is_empty() {
        return Err(DescError::Malformed("empty line in document".into()));
    }
    let mut tokens = line.split(' ');
    let keyword = tokens.next().unwrap_or_default();
    if keyword.is_empty()
        || !keyword
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
    {
        return Err(DescError::Malformed("invalid directive keyword".into()));
    }

    let mut args = Vec::new();
    for token in tokens {
        if token.is_empty() {
            return Err(DescError::Malformed(
                "stray whitespace on directive line".into(),
            ));
        }
        if !token.bytes().all(|b| b.is_ascii_graphic()) {
            return Err(DescError::Malformed(
                "directive argument contains invalid bytes".into(),
            ));
        }
        args.push(token);
    }

    Ok(Item {
        keyword,
        args,
        object: None,
        offset,
    })
}

fn parse_armor_kind(rest: &str) -> Result<&str> {
    let kind = rest
        .strip_suffix(ARMOR_TAIL)
        .ok_or_else(|| DescError::Malformed("malformed armor header".into()))?;
    let valid = !kind.is_empty()
        && !kind.starts_with(' ')
        && !kind.ends_with(' ')
        && kind
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || b == b' ');
    if !valid {
        return Err(DescError::Malformed("malformed armor block kind".into()));
    }
    Ok(kind)
}

fn read_object(lines: &mut Lines<'_>, kind: &str) -> Result<Object> {
    let footer = format!("{ARMOR_END}{kind}{ARMOR_TAIL}");
    let mut payload = String::new();
    loop {
        let (_, line) = lines
            .next()
            .ok_or_else(|| DescError::Malformed("armored block is not terminated".into()))?;
        if line == footer {
            break;
        }
        if line.starts_with("-----") {
            return Err(DescError::Malformed(
                "mismatched armor footer inside block".into(),
            ));
        }
        if line.is_empty() || line.len() > 64 {
            return Err(DescError::Malformed(
                "armored block payload line has invalid length".into(),
            ));
        }
        payload.push_str(line);
    }
    let data = armor::dearmor_payload(&payload)?;
    Ok(Object {
        kind: kind.to_string(),
        data,
    })
}

/// Parse a decimal integer per the common encoding rules: digits only, no
/// sign, no leading zero except a sole `0`.
pub(crate) fn parse_uint(token: &str) -> Result<u64> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DescError::Malformed("integer field is not decimal".into()));
    }
    if token.len() > 1 && token.starts_with('0') {
        return Err(DescError::Malformed("integer field has a leading zero".into()));
    }
    token
        .parse::<u64>()
        .map_err(|_| DescError::Malformed("integer field is out of range".into()))
}
