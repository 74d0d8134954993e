//! Slug derivation and validation.
//!
//! The slug is the public routing key for a page, so the transform must be
//! deterministic and idempotent: deriving an already-derived slug is a no-op.

use regex::Regex;

lazy_static::lazy_static! {
    /// Valid slug pattern: lowercase letters, numbers, and hyphens
    static ref SLUG_REGEX: Regex = Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").unwrap();
}

pub fn is_valid_slug(slug: &str) -> bool {
    SLUG_REGEX.is_match(slug)
}

/// Derive a URL-safe slug from a title: lowercase, drop everything outside
/// `[a-z0-9 -]`, collapse whitespace/hyphen runs into single hyphens, trim.
pub fn derive_slug(title: &str) -> String {
    let lowered = title.to_lowercase();
    let filtered: String = lowered
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == ' ' || *c == '-')
        .collect();

    let mut out = String::with_capacity(filtered.len());
    let mut prev_hyphen = true; // suppress leading hyphens
    for c in filtered.chars() {
        if c == ' ' || c == '-' {
            if !prev_hyphen {
                out.push('-');
                prev_hyphen = true;
            }
        } else {
            out.push(c);
            prev_hyphen = false;
        }
    }
    if out.ends_with('-') {
        out.pop();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_slug_basic() {
        assert_eq!(derive_slug("Hello, World!"), "hello-world");
        assert_eq!(derive_slug("Evacuation Centers"), "evacuation-centers");
        assert_eq!(derive_slug("  Typhoon   Preparedness  "), "typhoon-preparedness");
    }

    #[test]
    fn test_derive_slug_keeps_digits_and_hyphens() {
        assert_eq!(derive_slug("Barangay 7 - Flood Map"), "barangay-7-flood-map");
        assert_eq!(derive_slug("2024 Annual Report"), "2024-annual-report");
    }

    #[test]
    fn test_derive_slug_idempotent() {
        for title in ["Hello, World!", "DRRM Plan (2024)", "a--b  c"] {
            let once = derive_slug(title);
            assert_eq!(derive_slug(&once), once);
        }
    }

    #[test]
    fn test_derive_slug_strips_symbols() {
        assert_eq!(derive_slug("FAQ: What's an MDRRMO?"), "faq-whats-an-mdrrmo");
        assert_eq!(derive_slug("100% Ready!"), "100-ready");
    }

    #[test]
    fn test_derive_slug_empty_and_symbol_only() {
        assert_eq!(derive_slug(""), "");
        assert_eq!(derive_slug("???"), "");
    }

    #[test]
    fn test_is_valid_slug() {
        assert!(is_valid_slug("hello-world"));
        assert!(is_valid_slug("barangay-7"));
        assert!(!is_valid_slug("Hello-World"));
        assert!(!is_valid_slug("-leading"));
        assert!(!is_valid_slug("trailing-"));
        assert!(!is_valid_slug("double--hyphen"));
        assert!(!is_valid_slug(""));
    }

    #[test]
    fn test_derived_slugs_are_valid() {
        for title in ["Hello, World!", "Barangay 7 - Flood Map", "FAQ: What's an MDRRMO?"] {
            assert!(is_valid_slug(&derive_slug(title)), "title: {}", title);
        }
    }
}
