//! Canonical and user-facing key types, and the path expander that
//! translates between them.
//!
//! A user key is a `.`-delimited sequence of tag names, any of which may
//! carry a list subscript: `tag[5]`, `tag[#]`, `tag[$]`, `tag[+]`,
//! `tag[*]`. The canonical form spells each subscripted segment out as two
//! plain segments: a pluralised container (`tags`) and an indexed element
//! (`tag5`), e.g. `dog[1].name` canonicalizes to `dogs.dog1.name`, and
//! `dog[#]` canonicalizes to `dogs.total`.
//!
//! Forbidden characters in a bare tag name: `.` `#` `%` `[`.

use crate::error::{Result, XmlTreeError};

/// Maximum length, in bytes, of a canonical key. Matches the fixed-size
/// expansion buffer of the reference implementation.
pub const KEY_MAX: usize = 256;

/// One subscript form a user-key segment can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subscript {
    /// `tag[N]` — the Nth (1-based) element.
    Index(u32),
    /// `tag[#]` — the container's total count.
    Total,
    /// `tag[$]` — the last existing element (resolves through `total`).
    Last,
    /// `tag[+]` — append a new element after the current total.
    Append,
    /// `tag[*]` — the whole list, as a unit (delete only).
    Whole,
}

/// One segment of a parsed user key: a tag name plus an optional
/// subscript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSegment<'a> {
    pub tag: &'a str,
    pub subscript: Option<Subscript>,
}

/// A parsed, not-yet-expanded user key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserKey<'a> {
    pub segments: Vec<UserSegment<'a>>,
}

impl<'a> UserKey<'a> {
    pub fn parse(raw: &'a str) -> Result<Self> {
        if raw.is_empty() {
            return Err(XmlTreeError::MalformedKey("empty key".into()));
        }
        let mut segments = Vec::new();
        for part in raw.split('.') {
            segments.push(parse_segment(part)?);
        }
        Ok(UserKey { segments })
    }
}

fn parse_segment(part: &str) -> Result<UserSegment<'_>> {
    if part.is_empty() {
        return Err(XmlTreeError::MalformedKey("empty segment".into()));
    }
    if let Some(open) = part.find('[') {
        if !part.ends_with(']') {
            return Err(XmlTreeError::MalformedKey(format!(
                "unterminated subscript in {part:?}"
            )));
        }
        let tag = &part[..open];
        let inner = &part[open + 1..part.len() - 1];
        validate_tag(tag)?;
        let subscript = match inner {
            "#" => Subscript::Total,
            "$" => Subscript::Last,
            "+" => Subscript::Append,
            "*" => Subscript::Whole,
            n => {
                let idx: u32 = n
                    .parse()
                    .map_err(|_| XmlTreeError::MalformedKey(format!("bad subscript {inner:?}")))?;
                if idx == 0 {
                    return Err(XmlTreeError::MalformedKey("subscript is 1-based".into()));
                }
                Subscript::Index(idx)
            }
        };
        Ok(UserSegment { tag, subscript: Some(subscript) })
    } else {
        validate_tag(part)?;
        Ok(UserSegment { tag: part, subscript: None })
    }
}

fn validate_tag(tag: &str) -> Result<()> {
    if tag.is_empty() {
        return Err(XmlTreeError::MalformedKey("empty tag name".into()));
    }
    if tag.bytes().any(|b| matches!(b, b'.' | b'#' | b'%' | b'[')) {
        return Err(XmlTreeError::MalformedKey(format!("forbidden character in {tag:?}")));
    }
    Ok(())
}

/// A validated canonical key: plain dotted tag names, no subscripts, at
/// most [`KEY_MAX`] bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalKey(String);

impl CanonicalKey {
    pub fn new() -> Self {
        CanonicalKey(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.').filter(|s| !s.is_empty())
    }

    /// Appends a plain tag-name segment, enforcing the length cap.
    pub fn push_segment(&mut self, segment: &str) -> Result<()> {
        let extra = if self.0.is_empty() { segment.len() } else { segment.len() + 1 };
        if self.0.len() + extra > KEY_MAX {
            return Err(XmlTreeError::KeyTooLong);
        }
        if !self.0.is_empty() {
            self.0.push('.');
        }
        self.0.push_str(segment);
        Ok(())
    }

    /// The parent of this key (all but the last segment), or `None` if
    /// this key has no parent.
    pub fn parent(&self) -> Option<CanonicalKey> {
        let (head, _) = self.0.rsplit_once('.')?;
        Some(CanonicalKey(head.to_string()))
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl Default for CanonicalKey {
    fn default() -> Self {
        Self::new()
    }
}

/// A container name pluralized from a tag name: `dog` -> `dogs`. The
/// reference format always appends a literal `s`, it does not do English
/// pluralization.
pub fn container_name(tag: &str) -> String {
    format!("{tag}s")
}

pub fn element_name(tag: &str, index: u32) -> String {
    format!("{tag}{index}")
}

pub fn total_key_suffix() -> &'static str {
    "total"
}

/// Splits a canonical segment like `dog3` into its literal tag `dog` and
/// 1-based index `3`, by stripping trailing ASCII digits. A segment with
/// no trailing digits (a plain container or leaf name, e.g. `total`)
/// splits as `(segment, 0)`.
pub fn split_indexed_segment(segment: &str) -> (&str, u32) {
    let digit_start = segment.len() - segment.bytes().rev().take_while(u8::is_ascii_digit).count();
    if digit_start == 0 || digit_start == segment.len() {
        return (segment, 0);
    }
    match segment[digit_start..].parse::<u32>() {
        Ok(n) => (&segment[..digit_start], n),
        Err(_) => (segment, 0),
    }
}
