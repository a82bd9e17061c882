//! The named-argument carrier for CRUD and query operations.
//!
//! Backed by a `BTreeMap`, which is itself a balanced (red-black-family)
//! tree keyed by the field name; iteration is therefore deterministic and
//! in-order by key, matching the named-argument ordering the SQL builder
//! depends on.

use std::collections::BTreeMap;
use std::iter::FromIterator;

use crate::value::Value;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dictionary {
    entries: BTreeMap<String, Value>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self { entries: BTreeMap::new() }
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.entries.insert(field.into(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.entries.get(field)
    }

    pub fn contains_key(&self, field: &str) -> bool {
        self.entries.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl FromIterator<(String, Value)> for Dictionary {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self { entries: iter.into_iter().collect() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iterates_in_key_order_regardless_of_insertion_order() {
        let mut dict = Dictionary::new();
        dict.insert("zeta", 1i64);
        dict.insert("alpha", 2i64);
        dict.insert("mu", 3i64);

        let keys: Vec<&str> = dict.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["alpha", "mu", "zeta"]);
    }
}
