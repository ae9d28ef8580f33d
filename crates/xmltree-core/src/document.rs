//! The document handle: borrowed source bytes plus an insertion-ordered
//! edit journal, tied together by the overlay resolver.

#[cfg(feature = "prefix-cache")]
use crate::cache::PrefixCache;
use crate::entity::{decode_entities, encode_entities};
use crate::error::{Result, XmlTreeError};
use crate::journal::{EditJournal, EditRecord, Resolution};
use crate::key::{container_name, element_name, split_indexed_segment, CanonicalKey, Subscript, UserKey};
use crate::locator::{self, Located, Span};
#[cfg(feature = "prefix-cache")]
use std::cell::RefCell;
use std::collections::HashMap;

/// An in-memory, zero-copy XML reader/editor addressed by dotted path
/// expressions.
pub struct XmlDocument<'a> {
    source: &'a [u8],
    journal: EditJournal,
    #[cfg(feature = "prefix-cache")]
    cache: RefCell<PrefixCache>,
}

impl<'a> XmlDocument<'a> {
    pub fn new(source: &'a [u8]) -> Self {
        Self {
            source,
            journal: EditJournal::new(),
            #[cfg(feature = "prefix-cache")]
            cache: RefCell::new(PrefixCache::new()),
        }
    }

    /// Gets the decoded text value of a leaf element. Prior edits are
    /// honoured.
    pub fn get(&self, user_key: &str) -> Result<String> {
        let resolved = self.canonicalize(user_key)?;
        if resolved.is_whole {
            return Err(XmlTreeError::MalformedKey("[*] is only valid in delete".into()));
        }
        if resolved.is_total {
            return Ok(self.current_total(resolved.key.as_str()).to_string());
        }
        self.read_value(resolved.key.as_str()).ok_or(XmlTreeError::NotFound)
    }

    /// Tests whether the tag described by `user_key` exists. A malformed
    /// key is simply reported as non-existent, matching the reference
    /// behaviour (`exists` never surfaces an error).
    pub fn exists(&self, user_key: &str) -> bool {
        match self.canonicalize(user_key) {
            Ok(resolved) if resolved.is_whole => false,
            Ok(resolved) if resolved.is_total => true,
            Ok(resolved) => self.resolve_any(resolved.key.as_str()).is_some(),
            Err(_) => false,
        }
    }

    /// Updates the text value of an existing element.
    pub fn update(&mut self, user_key: &str, value: &str) -> Result<()> {
        let resolved = self.canonicalize(user_key)?;
        if resolved.is_whole {
            return Err(XmlTreeError::MalformedKey("[*] is only valid in delete".into()));
        }
        if resolved.is_total {
            return Err(XmlTreeError::Forbidden);
        }
        if self.resolve_any(resolved.key.as_str()).is_none() {
            return Err(XmlTreeError::NotFound);
        }
        self.journal.push(EditRecord::Set { key: resolved.key.into_string(), value: value.to_string() });
        self.invalidate_cache();
        Ok(())
    }

    /// Appends a new tag to its parent, creating parents as needed.
    pub fn append(&mut self, user_key: &str, value: Option<&str>) -> Result<()> {
        let resolved = self.canonicalize(user_key)?;
        if resolved.is_total || resolved.is_whole {
            return Err(XmlTreeError::MalformedKey("cannot append to [#] or [*]".into()));
        }
        if self.resolve_any(resolved.key.as_str()).is_some() {
            return Err(XmlTreeError::AlreadyExists);
        }
        // Synthesize every absent ancestor container, left to right, as
        // its own pure-container Append record before the leaf itself --
        // later reads/writes address these containers directly (e.g.
        // `top.cat[*]`, or `keys()` listing them).
        let segments: Vec<&str> = resolved.key.segments().collect();
        let mut ancestor = CanonicalKey::new();
        for seg in &segments[..segments.len().saturating_sub(1)] {
            ancestor.push_segment(seg)?;
            if self.resolve_any(ancestor.as_str()).is_none() {
                self.journal.push(EditRecord::Append { key: ancestor.as_str().to_string(), value: None });
            }
        }
        self.journal.push(EditRecord::Append {
            key: resolved.key.as_str().to_string(),
            value: value.map(|v| v.to_string()),
        });
        if let Some(container) = resolved.bump_total_of {
            self.bump_total(&container);
        }
        self.invalidate_cache();
        Ok(())
    }

    /// Deletes the element (and its children). Deleting a nonexistent
    /// element is a no-op success.
    pub fn delete(&mut self, user_key: &str) -> Result<()> {
        let resolved = self.canonicalize(user_key)?;
        if resolved.is_total {
            return Err(XmlTreeError::Forbidden);
        }
        // `[*]` already canonicalizes to the container itself (`dogs`, not
        // `dogs.dog3`) -- see the `Subscript::Whole` arm of `canonicalize`,
        // so the container is the delete target directly, no parent needed.
        self.journal.push(EditRecord::Delete { key: resolved.key.into_string() });
        if let Some(container) = resolved.decrement_total_of {
            self.decrement_total(&container);
        }
        self.invalidate_cache();
        Ok(())
    }

    /// Updates, creates or deletes an element depending on whether it
    /// already exists and whether `value` is `Some`.
    pub fn set(&mut self, user_key: &str, value: Option<&str>) -> Result<()> {
        match value {
            None => self.delete(user_key),
            Some(v) => {
                let resolved = self.canonicalize(user_key)?;
                if resolved.is_total {
                    return Err(XmlTreeError::Forbidden);
                }
                if self.resolve_any(resolved.key.as_str()).is_some() {
                    self.update(user_key, v)
                } else {
                    self.append(user_key, Some(v))
                }
            }
        }
    }

    /// Expands a key containing `[$]`/`[+]` into its concrete numeric
    /// form. `[#]` canonicalizes to `.total` without needing document
    /// state.
    pub fn expand_key(&self, user_key: &str) -> Result<String> {
        Ok(self.canonicalize(user_key)?.key.into_string())
    }

    /// Serializes the document, edits applied, to `sink`. Stops early if
    /// `sink` returns fewer bytes than it was given (the short-return
    /// cancellation protocol), returning the bytes accumulated so far.
    pub fn write_to(&self, mut sink: impl FnMut(&[u8]) -> std::io::Result<usize>) -> Result<u64> {
        let rendered = self.render();
        let mut written = 0u64;
        let mut offset = 0usize;
        while offset < rendered.len() {
            let n = sink(&rendered[offset..])?;
            written += n as u64;
            if n == 0 || offset + n < rendered.len() {
                offset += n;
                break;
            }
            offset += n;
        }
        Ok(written)
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.render()
    }

    /// All keys in the document (containers and leaves), in the order
    /// `write_to` would emit them.
    pub fn keys(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_keys(String::new(), "", Some(Span { start: 0, end: self.source.len() }), &mut out);
        out
    }

    // --- internals ---------------------------------------------------

    fn invalidate_cache(&mut self) {
        #[cfg(feature = "prefix-cache")]
        self.cache.get_mut().invalidate();
    }

    /// Reads the decoded content of `key` honouring the journal overlay,
    /// falling back to the source document.
    fn read_value(&self, key: &str) -> Option<String> {
        match self.journal.resolve(key) {
            Resolution::Value(v) => Some(v.to_string()),
            Resolution::Deleted => None,
            Resolution::EmptyContainer => Some(String::new()),
            Resolution::Unedited => {
                let scope = self.locate_source(key)?;
                Some(decode_entities(scope.content.slice(self.source)))
            }
        }
    }

    /// True if `key` resolves to *something* (leaf or container), honouring
    /// deletes.
    fn resolve_any(&self, key: &str) -> Option<()> {
        match self.journal.resolve(key) {
            Resolution::Deleted => None,
            Resolution::Value(_) | Resolution::EmptyContainer => Some(()),
            Resolution::Unedited => self.locate_source(key).map(|_| ()),
        }
    }

    /// Locates `key`'s span directly in the source document, descending
    /// one literal tag name per dotted segment. A segment's trailing
    /// digits (if any) select which same-named sibling to descend into
    /// (`dog3` means the 3rd literal `<dog>`); a segment with no trailing
    /// digits (`dogs`, `total`, `name`) is matched as-is against the
    /// first sibling of that literal name.
    fn locate_source(&self, key: &str) -> Option<Located> {
        #[cfg(feature = "prefix-cache")]
        if let Some(scope) = self.cache.borrow().get(key) {
            // The cache stores the content span itself, so wrap it back
            // into a `Located`; the element span is not needed by callers
            // that hit the cache (they only ever want `.content`).
            return Some(Located { element: scope, content: scope });
        }
        let steps: Vec<locator::Step<'_>> = key
            .split('.')
            .filter(|s| !s.is_empty())
            .map(|seg| {
                let (tag, n) = split_indexed_segment(seg);
                // A segment with no trailing digits at all (`tag.len() ==
                // seg.len()`) has no index restriction -- match the sole
                // expected occurrence (index 1). A segment with an
                // explicit digit suffix keeps that index verbatim, *even
                // when it is literally 0* (the `[$]`-on-an-empty-list
                // fallback sentinel): index 0 must never match anything,
                // not silently fall back to "the first one".
                let index = if tag.len() == seg.len() { 1 } else { n };
                locator::Step { tag, index }
            })
            .collect();
        let found = locator::locate(self.source, &steps)?;
        #[cfg(feature = "prefix-cache")]
        self.cache.borrow_mut().set(key, found.content);
        Some(found)
    }

    fn current_total(&self, total_key: &str) -> u32 {
        self.read_value(total_key).and_then(|s| s.parse().ok()).unwrap_or(0)
    }

    /// Sets `container.total`, creating the element if this is the first
    /// entry in the list.
    fn bump_total(&mut self, container: &str) {
        let total_key = format!("{container}.total");
        let new_total = self.current_total(&total_key) + 1;
        self.poke_leaf(&total_key, &new_total.to_string());
    }

    fn decrement_total(&mut self, container: &str) {
        let total_key = format!("{container}.total");
        let current = self.current_total(&total_key);
        let new_total = current.saturating_sub(1);
        self.poke_leaf(&total_key, &new_total.to_string());
    }

    /// Pushes a Set if the key already resolves, otherwise an Append --
    /// used for bookkeeping writes the public API doesn't expose directly
    /// (the `.total` leaf).
    fn poke_leaf(&mut self, key: &str, value: &str) {
        let record = if self.resolve_any(key).is_some() {
            EditRecord::Set { key: key.to_string(), value: value.to_string() }
        } else {
            EditRecord::Append { key: key.to_string(), value: Some(value.to_string()) }
        };
        self.journal.push(record);
    }

    /// Parses and canonicalizes a user key, resolving `[$]`/`[+]` against
    /// the current total where needed.
    fn canonicalize(&self, user_key: &str) -> Result<ResolvedKey> {
        let parsed = UserKey::parse(user_key)?;
        let mut canonical = CanonicalKey::new();
        let mut is_total = false;
        let mut is_whole = false;
        let mut bump_total_of = None;
        let mut decrement_total_of = None;
        let n_segments = parsed.segments.len();

        for (i, seg) in parsed.segments.iter().enumerate() {
            let is_last = i + 1 == n_segments;
            match seg.subscript {
                None => canonical.push_segment(seg.tag)?,
                Some(Subscript::Index(n)) => {
                    canonical.push_segment(&container_name(seg.tag))?;
                    canonical.push_segment(&element_name(seg.tag, n))?;
                }
                Some(Subscript::Total) => {
                    if !is_last {
                        return Err(XmlTreeError::MalformedKey(
                            "[#] is only valid as the final segment".into(),
                        ));
                    }
                    canonical.push_segment(&container_name(seg.tag))?;
                    is_total = true;
                    canonical.push_segment("total")?;
                }
                Some(Subscript::Last) => {
                    canonical.push_segment(&container_name(seg.tag))?;
                    let total_key = format!("{}.total", canonical.as_str());
                    let total = self.current_total(&total_key);
                    canonical.push_segment(&element_name(seg.tag, total))?;
                    // Only a nonempty list has anything to decrement; on an
                    // absent/empty list `total` is already 0, so deleting
                    // `[$]` is a no-op and must not materialize a `.total`
                    // leaf that wasn't there before.
                    if is_last && total >= 1 {
                        decrement_total_of = Some(total_prefix(&canonical));
                    }
                }
                Some(Subscript::Append) => {
                    canonical.push_segment(&container_name(seg.tag))?;
                    let total_key = format!("{}.total", canonical.as_str());
                    let total = self.current_total(&total_key);
                    canonical.push_segment(&element_name(seg.tag, total + 1))?;
                    // Unlike `[$]` on delete (which only decrements when it
                    // is the final segment), `[+]` bumps the list total
                    // wherever it appears in the key -- `cat[+].name` bumps
                    // `cats.total` just as `cat[+]` alone would.
                    bump_total_of = Some(total_prefix(&canonical));
                }
                Some(Subscript::Whole) => {
                    if !is_last {
                        return Err(XmlTreeError::MalformedKey(
                            "[*] is only valid as the final segment".into(),
                        ));
                    }
                    canonical.push_segment(&container_name(seg.tag))?;
                    is_whole = true;
                }
            }
        }
        Ok(ResolvedKey { key: canonical, is_total, is_whole, bump_total_of, decrement_total_of })
    }

    fn render(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.source.len());
        let scope = Span { start: 0, end: self.source.len() };
        self.render_children(&mut out, "", "", Some(scope));
        out
    }

    /// Renders one scope's children: existing source children (with
    /// journal overrides applied in place, preserving original order and
    /// raw untouched bytes) followed by any purely journal-born children,
    /// in first-appearance order.
    ///
    /// `owner_tag` is the literal tag of the element whose content this
    /// scope is (empty at the document root); it is what lets a repeated
    /// literal child (`<dog>` under an owning `<dogs>`) be told apart
    /// from a singleton one (`<total>` under that same `<dogs>`): the
    /// former's owner tag is its own pluralised container name, the
    /// latter's isn't.
    fn render_children(&self, out: &mut Vec<u8>, prefix: &str, owner_tag: &str, source_scope: Option<Span>) {
        let mut seen = Vec::new();
        let mut counts: HashMap<String, u32> = HashMap::new();
        if let Some(scope) = source_scope {
            let mut pos = scope.start;
            while let Some((name, element, content, next_pos)) =
                locator::next_child(self.source, pos, scope.end)
            {
                out.extend_from_slice(&self.source[pos..element.start]);
                let tag = String::from_utf8_lossy(name.slice(self.source)).into_owned();
                let child_key = child_canonical_key(prefix, owner_tag, &tag, &mut counts);
                seen.push(child_key.clone());
                match self.journal.resolve(&child_key) {
                    Resolution::Deleted => {}
                    Resolution::Value(v) => {
                        out.extend_from_slice(element.slice(self.source).split_at(content.start - element.start).0);
                        let mut encoded = String::new();
                        encode_entities(v, &mut encoded);
                        out.extend_from_slice(encoded.as_bytes());
                        out.extend_from_slice(b"</");
                        out.extend_from_slice(tag.as_bytes());
                        out.push(b'>');
                    }
                    Resolution::EmptyContainer | Resolution::Unedited => {
                        out.extend_from_slice(&self.source[element.start..content.start]);
                        self.render_children(out, &child_key, &tag, Some(content));
                        out.extend_from_slice(b"</");
                        out.extend_from_slice(tag.as_bytes());
                        out.push(b'>');
                    }
                }
                pos = next_pos;
            }
            out.extend_from_slice(&self.source[pos..scope.end]);
        }
        for (tag, child_key) in self.journal_only_children(prefix, owner_tag, &seen) {
            match self.journal.resolve(&child_key) {
                Resolution::Deleted => {}
                Resolution::Value(v) => {
                    out.push(b'<');
                    out.extend_from_slice(tag.as_bytes());
                    out.push(b'>');
                    let mut encoded = String::new();
                    encode_entities(v, &mut encoded);
                    out.extend_from_slice(encoded.as_bytes());
                    out.extend_from_slice(b"</");
                    out.extend_from_slice(tag.as_bytes());
                    out.push(b'>');
                }
                Resolution::EmptyContainer | Resolution::Unedited => {
                    out.push(b'<');
                    out.extend_from_slice(tag.as_bytes());
                    out.push(b'>');
                    self.render_children(out, &child_key, &tag, None);
                    out.extend_from_slice(b"</");
                    out.extend_from_slice(tag.as_bytes());
                    out.push(b'>');
                }
            }
        }
    }

    /// Canonical child keys that appear in the journal directly under
    /// `prefix` but were not already rendered from source, paired with
    /// the literal tag to emit for each, in first-appearance order.
    fn journal_only_children(
        &self,
        prefix: &str,
        owner_tag: &str,
        already_seen: &[String],
    ) -> Vec<(String, String)> {
        let dotted_prefix = if prefix.is_empty() { String::new() } else { format!("{prefix}.") };
        let mut order: Vec<(String, String)> = Vec::new();
        for record in self.journal.iter_oldest_to_newest() {
            let key = record.key();
            let Some(rest) = key.strip_prefix(dotted_prefix.as_str()) else {
                continue;
            };
            if rest.is_empty() {
                continue;
            }
            let first = rest.split('.').next().unwrap();
            let (base, n) = split_indexed_segment(first);
            let is_indexed = n > 0 && owner_tag == container_name(base);
            let child_key = join_key(prefix, first);
            if already_seen.iter().any(|s| s == &child_key) {
                continue;
            }
            if !order.iter().any(|(_, k): &(String, String)| k == &child_key) {
                let literal_tag = if is_indexed { base.to_string() } else { first.to_string() };
                order.push((literal_tag, child_key));
            }
        }
        order
    }

    fn collect_keys(&self, prefix: String, owner_tag: &str, source_scope: Option<Span>, out: &mut Vec<String>) {
        let mut seen = Vec::new();
        let mut counts: HashMap<String, u32> = HashMap::new();
        if let Some(scope) = source_scope {
            let mut pos = scope.start;
            while let Some((name, _element, content, next_pos)) = locator::next_child(self.source, pos, scope.end) {
                let tag = String::from_utf8_lossy(name.slice(self.source)).into_owned();
                let child_key = child_canonical_key(&prefix, owner_tag, &tag, &mut counts);
                seen.push(child_key.clone());
                pos = next_pos;
                if matches!(self.journal.resolve(&child_key), Resolution::Deleted) {
                    continue;
                }
                out.push(child_key.clone());
                match self.journal.resolve(&child_key) {
                    Resolution::Value(_) | Resolution::Deleted => {}
                    _ => self.collect_keys(child_key, &tag, Some(content), out),
                }
            }
        }
        for (tag, child_key) in self.journal_only_children(&prefix, owner_tag, &seen) {
            if matches!(self.journal.resolve(&child_key), Resolution::Deleted) {
                continue;
            }
            out.push(child_key.clone());
            match self.journal.resolve(&child_key) {
                Resolution::Value(_) | Resolution::Deleted => {}
                _ => self.collect_keys(child_key, &tag, None, out),
            }
        }
    }
}

/// The canonical key for a literal child `tag` found directly under an
/// owner whose own literal tag is `owner_tag`. Indexed exactly when the
/// owner's tag is the child's pluralised container name (mirroring
/// `container_name`) -- e.g. a `<dog>` owned by `<dogs>` becomes `dogN`,
/// but a `<total>` owned by that same `<dogs>` stays bare.
fn child_canonical_key(prefix: &str, owner_tag: &str, tag: &str, counts: &mut HashMap<String, u32>) -> String {
    if owner_tag == container_name(tag) {
        let n = counts.entry(tag.to_string()).or_insert(0);
        *n += 1;
        join_key(prefix, &element_name(tag, *n))
    } else {
        join_key(prefix, tag)
    }
}

struct ResolvedKey {
    key: CanonicalKey,
    is_total: bool,
    is_whole: bool,
    bump_total_of: Option<String>,
    decrement_total_of: Option<String>,
}

fn join_key(prefix: &str, tag: &str) -> String {
    if prefix.is_empty() {
        tag.to_string()
    } else {
        format!("{prefix}.{tag}")
    }
}

/// The canonical key string for the container holding the element we just
/// pushed (i.e. `canonical` without its last segment).
fn total_prefix(canonical: &CanonicalKey) -> String {
    canonical.parent().map(|p| p.into_string()).unwrap_or_default()
}

