//! Shared utilities: text decoding and unique identifier generation.

use std::borrow::Cow;

/// Get a time-based seed value for pseudo-random number generation.
pub fn time_seed_nanos() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(12345)
}

/// Decode bytes to a string, handling various encodings.
///
/// This function:
/// 1. First tries UTF-8 (handles BOM automatically via encoding_rs)
/// 2. If malformed, tries the hint encoding (from `<?xml encoding="..."?>`)
/// 3. Falls back to Windows-1252 (common in legacy publisher exports)
pub fn decode_text<'a>(bytes: &'a [u8], hint_encoding: Option<&str>) -> Cow<'a, str> {
    let (result, _encoding, malformed) = encoding_rs::UTF_8.decode(bytes);

    if !malformed {
        return result;
    }

    if let Some(name) = hint_encoding
        && let Some(encoding) = encoding_rs::Encoding::for_label(name.as_bytes())
    {
        let (result, _, _) = encoding.decode(bytes);
        return result;
    }

    let (result, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
    result
}

/// Extract the encoding name from an XML declaration, if present.
pub fn extract_xml_encoding(bytes: &[u8]) -> Option<&str> {
    // Only check the first 100 bytes for the XML declaration
    let check_len = bytes.len().min(100);
    let prefix = &bytes[..check_len];

    let xml_start = prefix.windows(5).position(|w| w == b"<?xml")?;
    let after_xml = &prefix[xml_start..];

    let enc_pos = after_xml
        .windows(9)
        .position(|w| w.eq_ignore_ascii_case(b"encoding="))?;
    let after_enc = &after_xml[enc_pos + 9..];

    if after_enc.is_empty() {
        return None;
    }

    let quote = after_enc[0];
    if quote != b'"' && quote != b'\'' {
        return None;
    }

    let value_start = 1;
    let value_end = after_enc[value_start..].iter().position(|&b| b == quote)? + value_start;

    std::str::from_utf8(&after_enc[value_start..value_end]).ok()
}

/// Strip UTF-8 BOM if present.
pub fn strip_bom(data: &[u8]) -> &[u8] {
    if data.starts_with(&[0xEF, 0xBB, 0xBF]) {
        &data[3..]
    } else {
        data
    }
}

/// Collapse runs of whitespace to single spaces.
///
/// JATS sources are typically pretty-printed; text runs inside paragraphs
/// carry indentation and newlines that must not survive into node content.
pub fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

// ============================================================================
// Identifier Generation
// ============================================================================

/// Monotonically unique identifier generator.
///
/// Xorshift-based; seeded from the clock by default but accepts an explicit
/// seed so tests get reproducible identifiers. Generated identifiers look
/// like `section-9f2ab31c`. Uniqueness within one generator is guaranteed by
/// a collision check against everything handed out so far.
pub struct IdGenerator {
    state: u64,
    issued: std::collections::HashSet<String>,
}

impl IdGenerator {
    /// Create a generator seeded from the system clock.
    pub fn new() -> Self {
        Self::with_seed(time_seed_nanos())
    }

    /// Create a generator with a fixed seed (reproducible output).
    pub fn with_seed(seed: u64) -> Self {
        Self {
            // Xorshift must not start at zero
            state: seed | 1,
            issued: std::collections::HashSet::new(),
        }
    }

    fn next_raw(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    /// Generate a fresh identifier for the given object type prefix.
    pub fn generate(&mut self, prefix: &str) -> String {
        loop {
            let id = format!("{}-{:08x}", prefix, self.next_raw() as u32);
            if self.issued.insert(id.clone()) {
                return id;
            }
        }
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
