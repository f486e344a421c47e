// src/version.rs

//! Lenient version ordering
//!
//! Distribution versions found in archive names are not guaranteed to follow
//! any versioning scheme: besides `1.4.2` and `2.0b1` we meet date stamps like
//! `2013-01-29-16-44-48.878536`. Versions are therefore compared loosely:
//!
//! - runs of ASCII digits are numeric components, compared by value
//! - runs of lowercase ASCII letters are text components
//! - `.` only separates components
//! - any other run of characters (`-`, `+`, upper case letters, ...) is a
//!   text component of its own
//!
//! Component lists compare lexicographically, a numeric component sorts
//! before a text component and a proper prefix sorts first.

use std::cmp::Ordering;
use std::fmt;

/// A single component of a loosely parsed version
#[derive(Debug, Clone, PartialEq, Eq)]
enum Component<'a> {
    /// Digits with leading zeros stripped (`"0"` stays `"0"`)
    Number(&'a str),
    Text(&'a str),
}

impl Ord for Component<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Component::Number(a), Component::Number(b)) => {
                a.len().cmp(&b.len()).then_with(|| a.cmp(b))
            }
            (Component::Number(_), Component::Text(_)) => Ordering::Less,
            (Component::Text(_), Component::Number(_)) => Ordering::Greater,
            (Component::Text(a), Component::Text(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for Component<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Digit,
    Lower,
    Dot,
    Other,
}

fn classify(c: char) -> CharClass {
    if c.is_ascii_digit() {
        CharClass::Digit
    } else if c.is_ascii_lowercase() {
        CharClass::Lower
    } else if c == '.' {
        CharClass::Dot
    } else {
        CharClass::Other
    }
}

fn components(version: &str) -> Vec<Component<'_>> {
    let mut parts = Vec::new();
    let mut chars = version.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        let class = classify(c);
        let mut end = start + c.len_utf8();

        // Dots never group: each one is a bare separator
        if class == CharClass::Dot {
            continue;
        }

        while let Some(&(idx, next)) = chars.peek() {
            if classify(next) != class {
                break;
            }
            end = idx + next.len_utf8();
            chars.next();
        }

        let run = &version[start..end];
        match class {
            CharClass::Digit => {
                let trimmed = run.trim_start_matches('0');
                parts.push(Component::Number(if trimmed.is_empty() { "0" } else { trimmed }));
            }
            _ => parts.push(Component::Text(run)),
        }
    }

    parts
}

/// Compare two version strings with the lenient scheme described above
///
/// Distinct strings may compare equal (`1.0` and `1.00`); use
/// [`LooseVersion`] when a total order over strings is needed.
pub fn compare(a: &str, b: &str) -> Ordering {
    components(a).cmp(&components(b))
}

/// A version string ordered leniently, with ties broken by the raw string
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LooseVersion(String);

impl LooseVersion {
    pub fn new(version: impl Into<String>) -> Self {
        Self(version.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Ord for LooseVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        compare(&self.0, &other.0).then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for LooseVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for LooseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_components_compare_by_value() {
        assert_eq!(compare("1.4", "1.3"), Ordering::Greater);
        assert_eq!(compare("1.10", "1.9"), Ordering::Greater);
        assert_eq!(compare("0.1", "0.1"), Ordering::Equal);
        assert_eq!(compare("1.01", "1.1"), Ordering::Equal);
    }

    #[test]
    fn test_prefix_sorts_first() {
        assert_eq!(compare("1.0", "1.0.1"), Ordering::Less);
        assert_eq!(compare("2", "2.0"), Ordering::Less);
    }

    #[test]
    fn test_numbers_sort_before_text() {
        assert_eq!(compare("1.0.1", "1.0b1"), Ordering::Less);
        assert_eq!(compare("1.0a1", "1.0b1"), Ordering::Less);
        assert_eq!(compare("1.0rc1", "1.0b2"), Ordering::Greater);
    }

    #[test]
    fn test_date_stamped_versions_sort_chronologically() {
        let older = "2013-01-29-16-44-48.878536";
        let newer = "2014-01-29-16-44-48.878536";
        assert_eq!(compare(older, newer), Ordering::Less);
        assert_eq!(
            compare("2013-01-29-16-44-48.878536", "2013-01-29-16-44-49.000001"),
            Ordering::Less
        );
    }

    #[test]
    fn test_huge_numbers_do_not_overflow() {
        assert_eq!(
            compare("123456789012345678901234567890", "99999999999999999999"),
            Ordering::Greater
        );
    }

    #[test]
    fn test_components_split() {
        assert_eq!(
            components("2013-01.5a"),
            vec![
                Component::Number("2013"),
                Component::Text("-"),
                Component::Number("1"),
                Component::Number("5"),
                Component::Text("a"),
            ]
        );
        assert_eq!(
            components("1.0RC1"),
            vec![
                Component::Number("1"),
                Component::Number("0"),
                Component::Text("RC"),
                Component::Number("1"),
            ]
        );
    }

    #[test]
    fn test_loose_version_is_total() {
        let a = LooseVersion::new("1.0");
        let b = LooseVersion::new("1.00");
        assert_ne!(a.cmp(&b), Ordering::Equal);
        assert_eq!(a.cmp(&b), b.cmp(&a).reverse());

        let mut versions = vec![
            LooseVersion::new("1.4"),
            LooseVersion::new("1.10"),
            LooseVersion::new("1.3"),
        ];
        versions.sort();
        let sorted: Vec<&str> = versions.iter().map(|v| v.as_str()).collect();
        assert_eq!(sorted, vec!["1.3", "1.4", "1.10"]);
    }
}
