//! ## Set validator
//!
//! Within a single HAR file, every array that declares a set named `REG`
//! (say) must declare the exact same element list for it. This walks a
//! stream of [`HeaderArray`]s, remembers the first element list seen for
//! each set name, and reports every later mismatch. It never aborts the
//! walk itself; `SetMismatch` is a warning, not an error (see
//! `crate::error`).

use std::collections::HashMap;
use std::fmt;

use crate::array::HeaderArray;

#[derive(Debug, Clone, PartialEq)]
pub struct SetMismatch {
    pub set_name: String,
    pub first_seen: Vec<String>,
    pub found: Vec<String>,
}

impl fmt::Display for SetMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "set {} redeclared with different elements: first seen {:?}, found {:?}",
            self.set_name, self.first_seen, self.found
        )
    }
}

#[derive(Debug, Default)]
pub struct SetValidator {
    first_seen: HashMap<String, Vec<String>>,
    mismatches: Vec<SetMismatch>,
}

impl SetValidator {
    pub fn new() -> Self {
        SetValidator::default()
    }

    /// Checks one array's sets against everything seen so far, recording
    /// any mismatch.
    pub fn visit(&mut self, array: &HeaderArray) {
        for (name, elements) in array.sets() {
            match self.first_seen.get(name) {
                Some(seen) if seen != elements => {
                    let mismatch = SetMismatch {
                        set_name: name.clone(),
                        first_seen: seen.clone(),
                        found: elements.clone(),
                    };
                    log::warn!(target: "har::validator", "{mismatch}");
                    self.mismatches.push(mismatch);
                }
                Some(_) => {}
                None => {
                    self.first_seen.insert(name.clone(), elements.clone());
                }
            }
        }
    }

    pub fn mismatches(&self) -> &[SetMismatch] {
        &self.mismatches
    }

    pub fn is_consistent(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Convenience entry point: validates a whole slice of arrays in one call.
pub fn validate_all<'a>(arrays: impl IntoIterator<Item = &'a HeaderArray>) -> (bool, Vec<SetMismatch>) {
    let mut validator = SetValidator::new();
    for array in arrays {
        validator.visit(array);
    }
    (validator.is_consistent(), validator.mismatches().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::{ArrayType, HeaderArrayPayload};
    use crate::dict::SequenceDictionary;

    fn array_with_reg(header: &str, elements: &[&str]) -> HeaderArray {
        let dict: SequenceDictionary<f32> = SequenceDictionary::new(vec![(
            "REG".to_string(),
            elements.iter().map(|s| s.to_string()).collect(),
        )]);
        HeaderArray::new(
            header,
            "",
            ArrayType::Re,
            [elements.len() as i32, 1, 1, 1, 1, 1, 1],
            1,
            HeaderArrayPayload::Reals(dict),
        )
    }

    #[test]
    fn s4_set_mismatch_is_reported() {
        let a = array_with_reg("A1", &["AUS", "USA"]);
        let b = array_with_reg("B1", &["AUS", "CAN"]);

        let (consistent, mismatches) = validate_all([&a, &b]);
        assert!(!consistent);
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].set_name, "REG");
    }

    #[test]
    fn identical_sets_are_consistent() {
        let a = array_with_reg("A1", &["AUS", "USA"]);
        let b = array_with_reg("B1", &["AUS", "USA"]);
        let (consistent, mismatches) = validate_all([&a, &b]);
        assert!(consistent);
        assert!(mismatches.is_empty());
    }

    #[test]
    fn validation_is_idempotent_across_runs() {
        let a = array_with_reg("A1", &["AUS", "USA"]);
        let b = array_with_reg("B1", &["AUS", "CAN"]);
        let (_, first_run) = validate_all([&a, &b]);
        let (_, second_run) = validate_all([&a, &b]);
        assert_eq!(first_run, second_run);
    }
}
