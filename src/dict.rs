//! ## Sequence dictionary
//!
//! A sparse mapping from [`KeySequence`] to value, carrying the ordered list
//! of defining sets. Only entries whose value differs from the type's
//! default are stored; the full logical extent is the Cartesian product of
//! the sets, enumerated in reverse-lex order (last set varies slowest,
//! mirroring Fortran column-major storage).

use std::collections::HashMap;

use crate::error::{HarError, Result};
use crate::key::KeySequence;

/// One defining set: a name and its ordered element list.
pub type SetDef = (String, Vec<String>);

#[derive(Debug, Clone)]
pub struct SequenceDictionary<V> {
    sets: Vec<SetDef>,
    entries: HashMap<KeySequence, V>,
}

impl<V> SequenceDictionary<V>
where
    V: Clone + Default + PartialEq,
{
    pub fn new(sets: Vec<SetDef>) -> Self {
        SequenceDictionary {
            sets,
            entries: HashMap::new(),
        }
    }

    pub fn sets(&self) -> &[SetDef] {
        &self.sets
    }

    /// Product of the sizes of the defining sets: the logical size of the
    /// array, which may differ from the number of entries actually stored.
    pub fn total_size(&self) -> usize {
        self.sets.iter().map(|(_, elems)| elems.len().max(1)).product()
    }

    pub fn stored_len(&self) -> usize {
        self.entries.len()
    }

    /// Insert a value for `key`. A value equal to the type's default is
    /// never stored, so the dictionary stays sparse by construction.
    pub fn insert(&mut self, key: KeySequence, value: V) {
        if value != V::default() {
            self.entries.insert(key, value);
        } else {
            self.entries.remove(&key);
        }
    }

    /// The stored value for `key`, or the type's default if absent.
    pub fn get(&self, key: &KeySequence) -> V {
        self.entries.get(key).cloned().unwrap_or_default()
    }

    pub fn raw_entries(&self) -> impl Iterator<Item = (&KeySequence, &V)> {
        self.entries.iter()
    }

    /// All key tuples in reverse-lex order; its length is the product of the
    /// defining sets' sizes.
    pub fn expanded_keys(&self) -> ExpandedKeys<'_> {
        ExpandedKeys::new(&self.sets)
    }

    /// `expanded_keys()` mapped through `get`.
    pub fn logical_values(&self) -> impl Iterator<Item = V> + '_ {
        self.expanded_keys().map(move |k| self.get(&k))
    }

    /// The sub-dictionary over the suffix Cartesian product for every entry
    /// whose first `prefix.len()` components match `prefix`. Missing
    /// logical entries are materialized lazily with default values.
    pub fn get_partial(&self, prefix: &KeySequence) -> Result<PartialView<'_, V>> {
        if prefix.len() > self.sets.len() {
            return Err(HarError::KeyNotFound(prefix.to_string()));
        }
        for (component, (_, elements)) in prefix.as_slice().iter().zip(self.sets.iter()) {
            if !elements.iter().any(|e| e.eq_ignore_ascii_case(component)) {
                return Err(HarError::KeyNotFound(prefix.to_string()));
            }
        }
        Ok(PartialView {
            dict: self,
            prefix: prefix.clone(),
            suffix: ExpandedKeys::new(&self.sets[prefix.len()..]),
        })
    }
}

/// A lazy iterator over every key tuple in the Cartesian product of a list of
/// sets, in reverse-lex order (first set fastest, last set slowest).
pub struct ExpandedKeys<'a> {
    sets: &'a [SetDef],
    counters: Vec<usize>,
    finished: bool,
    emitted_empty: bool,
}

impl<'a> ExpandedKeys<'a> {
    fn new(sets: &'a [SetDef]) -> Self {
        let finished = sets.iter().any(|(_, elems)| elems.is_empty());
        ExpandedKeys {
            sets,
            counters: vec![0; sets.len()],
            finished,
            emitted_empty: false,
        }
    }
}

impl<'a> Iterator for ExpandedKeys<'a> {
    type Item = KeySequence;

    fn next(&mut self) -> Option<KeySequence> {
        if self.sets.is_empty() {
            if self.emitted_empty {
                return None;
            }
            self.emitted_empty = true;
            return Some(KeySequence::default());
        }

        if self.finished {
            return None;
        }

        let components: Vec<String> = self
            .counters
            .iter()
            .zip(self.sets.iter())
            .map(|(&idx, (_, elements))| elements[idx].clone())
            .collect();

        // advance the odometer, first set fastest
        let mut i = 0;
        loop {
            if i == self.counters.len() {
                self.finished = true;
                break;
            }
            self.counters[i] += 1;
            if self.counters[i] < self.sets[i].1.len() {
                break;
            }
            self.counters[i] = 0;
            i += 1;
        }

        Some(KeySequence::new(components))
    }
}

/// A lazily-materialized sub-dictionary over the suffix Cartesian product
/// produced by [`SequenceDictionary::get_partial`].
pub struct PartialView<'a, V> {
    dict: &'a SequenceDictionary<V>,
    prefix: KeySequence,
    suffix: ExpandedKeys<'a>,
}

impl<'a, V> Iterator for PartialView<'a, V>
where
    V: Clone + Default + PartialEq,
{
    type Item = (KeySequence, V);

    fn next(&mut self) -> Option<Self::Item> {
        let suffix_key = self.suffix.next()?;
        let mut full = self.prefix.as_slice().to_vec();
        full.extend(suffix_key.as_slice().iter().cloned());
        let full = KeySequence::new(full);
        let value = self.dict.get(&full);
        Some((full, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dict_2x2() -> SequenceDictionary<f32> {
        let mut d = SequenceDictionary::new(vec![
            ("COM".to_string(), vec!["c1".to_string(), "c2".to_string()]),
            ("REG".to_string(), vec!["r1".to_string(), "r2".to_string()]),
        ]);
        d.insert(KeySequence::new(vec!["c1".into(), "r1".into()]), 1.0);
        d.insert(KeySequence::new(vec!["c2".into(), "r1".into()]), 2.0);
        d.insert(KeySequence::new(vec!["c1".into(), "r2".into()]), 3.0);
        d.insert(KeySequence::new(vec!["c2".into(), "r2".into()]), 4.0);
        d
    }

    #[test]
    fn expanded_enumeration_length_and_values() {
        let d = dict_2x2();
        let keys: Vec<_> = d.expanded_keys().collect();
        assert_eq!(keys.len(), 4);
        let values: Vec<_> = d.logical_values().collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn reverse_lex_first_block_shares_last_component() {
        let d = dict_2x2();
        let keys: Vec<_> = d.expanded_keys().collect();
        // first |COM| keys should all share the same REG element
        assert_eq!(keys[0].as_slice()[1], keys[1].as_slice()[1]);
        assert_ne!(keys[0].as_slice()[1], keys[2].as_slice()[1]);
    }

    #[test]
    fn sparse_storage_invariant() {
        let mut d: SequenceDictionary<f32> = SequenceDictionary::new(vec![(
            "REG".to_string(),
            vec!["r1".to_string(), "r2".to_string()],
        )]);
        d.insert(KeySequence::new(vec!["r1".into()]), 0.0);
        assert_eq!(d.stored_len(), 0);
        d.insert(KeySequence::new(vec!["r1".into()]), 5.0);
        assert_eq!(d.stored_len(), 1);
    }

    #[test]
    fn partial_lookup_materializes_defaults() {
        let d = dict_2x2();
        let sub: Vec<_> = d
            .get_partial(&KeySequence::new(vec!["c1".into()]))
            .unwrap()
            .collect();
        assert_eq!(sub.len(), 2);
        assert_eq!(sub[0].1, 1.0);
        assert_eq!(sub[1].1, 3.0);
    }

    #[test]
    fn partial_lookup_rejects_invalid_prefix() {
        let d = dict_2x2();
        assert!(d.get_partial(&KeySequence::new(vec!["zz".into()])).is_err());
    }

    #[test]
    fn scalar_array_has_single_empty_key() {
        let d: SequenceDictionary<f32> = SequenceDictionary::new(vec![]);
        let keys: Vec<_> = d.expanded_keys().collect();
        assert_eq!(keys.len(), 1);
        assert!(keys[0].is_empty());
    }
}
