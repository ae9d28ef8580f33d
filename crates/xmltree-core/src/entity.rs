//! Entity codec: only `&lt;`, `&gt;` and `&amp;` are understood, matching
//! the documents this crate targets. Any other `&x...;` run is dropped up
//! to and including its terminating `;`, same as the reference decoder.
//!
//! Decoding is CDATA-aware: a `<![CDATA[ ... ]]>` run inside the content is
//! unwrapped to its payload verbatim, with no entity interpretation inside
//! it, matching how the cursor treats CDATA as opaque during scanning.

const CDATA_OPEN: &[u8] = b"<![CDATA[";
const CDATA_CLOSE: &[u8] = b"]]>";

/// Decodes the three known entities in `raw`, unwrapping any CDATA
/// sections to their raw payload, and copying everything else through
/// unchanged (including any multi-byte UTF-8 sequences, which are never
/// entity-decoded).
pub fn decode_entities(raw: &[u8]) -> String {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i..].starts_with(CDATA_OPEN) {
            let body_start = i + CDATA_OPEN.len();
            let body_end = find(raw, CDATA_CLOSE, body_start).unwrap_or(raw.len());
            out.extend_from_slice(&raw[body_start..body_end]);
            i = if body_end == raw.len() { raw.len() } else { body_end + CDATA_CLOSE.len() };
            continue;
        }
        let b = raw[i];
        if b == b'&' {
            if i + 1 < raw.len() {
                match raw[i + 1] {
                    b'l' => out.push(b'<'),
                    b'g' => out.push(b'>'),
                    b'a' => out.push(b'&'),
                    _ => {}
                }
            }
            // Skip to and past the terminating ';', dropping unknown
            // entities entirely (including ones we didn't recognize). A
            // trailing '&' with no follow byte at all is dropped too.
            let mut j = i + 1;
            while j < raw.len() && raw[j] != b';' {
                j += 1;
            }
            i = if j < raw.len() { j + 1 } else { raw.len() };
        } else {
            out.push(b);
            i += 1;
        }
    }
    String::from_utf8(out).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    haystack[from..].windows(needle.len()).position(|w| w == needle).map(|p| p + from)
}

/// Encodes `<`, `>` and `&` in `text`, appending the result to `out`.
pub fn encode_entities(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            _ => out.push(ch),
        }
    }
}
