//! Reduces a query name to its last two and last three labels.
//!
//! `www.Example.COM.` becomes `example.com` / `www.example.com`; anything deeper
//! (`a.b.c.example.com.`) is folded into the same pair, which is what lets the
//! 2- and 3-label tables show the zone under a random-subdomain attack instead
//! of a million one-hit names.

/// Longest name kept as a table key, in bytes.
pub const MAX_NAME_LEN: usize = 253;

/// The two suffixes recorded for a query name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameSuffixes {
    pub suffix2: String,
    pub suffix3: String,
}

/// Lower-cases `qname`, strips one trailing `.`, and splits off the last two
/// and three labels. Names with fewer labels come back whole; the root name
/// comes back as two empty strings.
pub fn decompose(qname: &str) -> NameSuffixes {
    let lowered = qname.to_ascii_lowercase();
    let name = lowered.strip_suffix('.').unwrap_or(&lowered);

    NameSuffixes {
        suffix2: last_labels(name, 2).to_string(),
        suffix3: last_labels(name, 3).to_string(),
    }
}

/// Last `count` dot-separated labels of `name`, or all of it if it has fewer.
/// A `\.` inside a label is part of the label, not a separator.
fn last_labels(name: &str, count: usize) -> &str {
    let bytes = name.as_bytes();
    let separator = |&(dot, _): &(usize, &str)| {
        let backslashes = bytes[..dot].iter().rev().take_while(|&&b| b == b'\\').count();
        backslashes % 2 == 0
    };
    match name.rmatch_indices('.').filter(separator).nth(count - 1) {
        Some((dot, _)) => &name[dot + 1..],
        None => name,
    }
}

/// Cuts `key` down to [`MAX_NAME_LEN`] bytes without splitting a character.
pub fn truncate_key(key: &str) -> &str {
    if key.len() <= MAX_NAME_LEN {
        return key;
    }
    let mut end = MAX_NAME_LEN;
    while !key.is_char_boundary(end) {
        end -= 1;
    }
    &key[..end]
}
