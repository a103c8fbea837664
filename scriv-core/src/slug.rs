//! Heading slug generation.

/// Maximum length in bytes of a heading slug before collision suffixes.
pub const MAX_SLUG_LEN: usize = 36;

/// Convert heading text to an anchor slug.
///
/// Rules:
/// - ASCII letters and digits are kept verbatim (case preserved)
/// - Any maximal run of other characters becomes a single `-`
/// - No leading, trailing or doubled `-`
/// - At most [`MAX_SLUG_LEN`] bytes
///
/// # Examples
///
/// ```
/// use scriv_core::slugify;
///
/// assert_eq!(slugify("h1 dupe"), "h1-dupe");
/// assert_eq!(slugify("Rust & Safety!"), "Rust-Safety");
/// assert_eq!(slugify("  --  "), "");
/// ```
pub fn slugify(input: &str) -> String {
    let mut out = String::with_capacity(input.len().min(MAX_SLUG_LEN));
    let mut pending_dash = false;

    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                if out.len() + 1 >= MAX_SLUG_LEN {
                    break;
                }
                out.push('-');
            }
            pending_dash = false;
            if out.len() >= MAX_SLUG_LEN {
                break;
            }
            out.push(c);
        } else {
            pending_dash = true;
        }
    }

    out
}

/// `base`, or `base-1` … `base-9` when taken. `None` once every candidate is taken.
pub fn disambiguate(base: &str, taken: impl Fn(&str) -> bool) -> Option<String> {
    if !taken(base) {
        return Some(base.to_string());
    }
    (1..=9)
        .map(|n| format!("{}-{}", base, n))
        .find(|candidate| !taken(candidate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_basic_slugify() {
        assert_eq!(slugify("Hello World"), "Hello-World");
        assert_eq!(slugify("h1 dupe"), "h1-dupe");
    }

    #[test]
    fn test_special_characters() {
        assert_eq!(slugify("C++ Programming"), "C-Programming");
        assert_eq!(slugify("Node.js Tips"), "Node-js-Tips");
        assert_eq!(slugify("What's new?"), "What-s-new");
    }

    #[test]
    fn test_non_ascii_collapses() {
        assert_eq!(slugify("Café au lait"), "Caf-au-lait");
        assert_eq!(slugify("日本"), "");
    }

    #[test]
    fn test_leading_trailing_hyphens() {
        assert_eq!(slugify("  Hello World  "), "Hello-World");
        assert_eq!(slugify("-Leading Hyphen"), "Leading-Hyphen");
        assert_eq!(slugify("Trailing Hyphen-"), "Trailing-Hyphen");
    }

    #[test]
    fn test_truncation() {
        let long = "abcdefghij ".repeat(10);
        let slug = slugify(&long);
        assert!(slug.len() <= MAX_SLUG_LEN);
        assert!(!slug.ends_with('-'));
        assert_eq!(slug, "abcdefghij-abcdefghij-abcdefghij-abc");

        // A separator landing on the limit is dropped, not emitted.
        let edge = format!("{} b", "a".repeat(35));
        assert_eq!(slugify(&edge), "a".repeat(35));
    }

    #[test]
    fn test_slug_alphabet() {
        for input in ["Hello, World!", "  ..a..b..  ", "x_y-z", "Ünïcödé 42"] {
            let slug = slugify(input);
            assert!(slug
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-'));
            assert!(!slug.starts_with('-') && !slug.ends_with('-'));
            assert!(!slug.contains("--"));
        }
    }

    #[test]
    fn test_disambiguate() {
        let mut taken = HashSet::new();
        for expected in ["dupe", "dupe-1", "dupe-2"] {
            let id = disambiguate("dupe", |c| taken.contains(c)).unwrap();
            assert_eq!(id, expected);
            taken.insert(id);
        }
    }

    #[test]
    fn test_disambiguate_gives_up_after_nine() {
        let mut taken: HashSet<String> = HashSet::new();
        taken.insert("x".into());
        for n in 1..=9 {
            taken.insert(format!("x-{}", n));
        }
        assert_eq!(disambiguate("x", |c| taken.contains(c)), None);
    }
}
