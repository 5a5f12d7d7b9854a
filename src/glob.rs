//! Key-pattern glob matcher (`spec.md` §6: "thin key-pattern glob matcher,"
//! named as an external collaborator but implemented directly here since a
//! library crate has no host application to supply one).
//!
//! Supports `*` (any run of characters, including none) and `?` (exactly one
//! character) only — no character classes, brace expansion, or escaping.

/// Match `key` against `pattern`. `*` matches any run of characters
/// (including zero); `?` matches exactly one character. Matching is
/// byte-exact (no case folding, no Unicode grapheme awareness beyond `char`
/// boundaries).
#[must_use]
pub fn matches(pattern: &str, key: &str) -> bool {
    matches_chars(&pattern.chars().collect::<Vec<_>>(), &key.chars().collect::<Vec<_>>())
}

fn matches_chars(pattern: &[char], key: &[char]) -> bool {
    match pattern.first() {
        None => key.is_empty(),
        Some('*') => {
            // Collapse a run of consecutive `*` into one, then try every
            // possible split point for the remaining key.
            let rest = skip_stars(pattern);
            if rest.is_empty() {
                return true;
            }
            (0..=key.len()).any(|i| matches_chars(rest, &key[i..]))
        }
        Some('?') => !key.is_empty() && matches_chars(&pattern[1..], &key[1..]),
        Some(c) => key.first() == Some(c) && matches_chars(&pattern[1..], &key[1..]),
    }
}

fn skip_stars(pattern: &[char]) -> &[char] {
    let mut i = 0;
    while pattern.get(i) == Some(&'*') {
        i += 1;
    }
    &pattern[i..]
}
