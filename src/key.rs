//! ## Key sequences
//!
//! A [`KeySequence`] is an immutable ordered tuple of string keys, one drawn
//! from each of an array's defining sets. Its canonical string form is
//! `[k0][k1]...[kn-1]`; the empty sequence stringifies to the empty string.

use std::cmp::Ordering;
use std::fmt;

use crate::error::{HarError, Result};

/// An immutable ordered tuple of string keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct KeySequence(Vec<String>);

impl KeySequence {
    pub fn new(components: Vec<String>) -> Self {
        KeySequence(components)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    /// Returns the prefix consisting of the first `len` components.
    pub fn prefix(&self, len: usize) -> KeySequence {
        KeySequence(self.0[..len.min(self.0.len())].to_vec())
    }

    /// Parses the canonical `[k0][k1]...[kn-1]` form, additionally accepting
    /// `*` and `][` as separators and trimming surrounding brackets, per the
    /// key-string grammar in the external interfaces section.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim().trim_start_matches('[').trim_end_matches(']');
        if trimmed.is_empty() {
            return Ok(KeySequence(Vec::new()));
        }
        let components = trimmed
            .split(|c| c == ']' || c == '[' || c == '*')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        Ok(KeySequence(components))
    }

    /// Case-insensitive ordinal comparison, component by component,
    /// left-to-right.
    pub fn cmp_forward(&self, other: &KeySequence) -> Ordering {
        for (a, b) in self.0.iter().zip(other.0.iter()) {
            let ord = a.to_ascii_lowercase().cmp(&b.to_ascii_lowercase());
            if ord != Ordering::Equal {
                return ord;
            }
        }
        self.0.len().cmp(&other.0.len())
    }

    /// Case-insensitive ordinal comparison with components taken in reverse
    /// order, the ordering used when enumerating the Cartesian product so
    /// that the last set varies slowest (Fortran column-major storage).
    pub fn cmp_reverse(&self, other: &KeySequence) -> Ordering {
        for (a, b) in self.0.iter().rev().zip(other.0.iter().rev()) {
            let ord = a.to_ascii_lowercase().cmp(&b.to_ascii_lowercase());
            if ord != Ordering::Equal {
                return ord;
            }
        }
        self.0.len().cmp(&other.0.len())
    }
}

impl fmt::Display for KeySequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for component in &self.0 {
            write!(f, "[{component}]")?;
        }
        Ok(())
    }
}

impl From<Vec<String>> for KeySequence {
    fn from(components: Vec<String>) -> Self {
        KeySequence(components)
    }
}

impl std::str::FromStr for KeySequence {
    type Err = HarError;

    fn from_str(s: &str) -> Result<Self> {
        KeySequence::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_canonical() {
        let k = KeySequence::new(vec!["AUS".into(), "r1".into()]);
        assert_eq!(k.to_string(), "[AUS][r1]");
        assert_eq!(KeySequence::default().to_string(), "");
    }

    #[test]
    fn parse_bracket_form() {
        let k = KeySequence::parse("[AUS][r1]").unwrap();
        assert_eq!(k.as_slice(), &["AUS".to_string(), "r1".to_string()]);
    }

    #[test]
    fn parse_accepts_star_and_bare_brackets() {
        let k = KeySequence::parse("AUS*r1").unwrap();
        assert_eq!(k.as_slice(), &["AUS".to_string(), "r1".to_string()]);

        let k = KeySequence::parse("AUS][r1").unwrap();
        assert_eq!(k.as_slice(), &["AUS".to_string(), "r1".to_string()]);
    }

    #[test]
    fn forward_vs_reverse_ordering() {
        let a = KeySequence::new(vec!["a".into(), "z".into()]);
        let b = KeySequence::new(vec!["b".into(), "a".into()]);
        assert_eq!(a.cmp_forward(&b), Ordering::Less);
        assert_eq!(a.cmp_reverse(&b), Ordering::Greater);
    }

    #[test]
    fn case_insensitive_ordinal() {
        let a = KeySequence::new(vec!["AUS".into()]);
        let b = KeySequence::new(vec!["aus".into()]);
        assert_eq!(a.cmp_forward(&b), Ordering::Equal);
    }
}
