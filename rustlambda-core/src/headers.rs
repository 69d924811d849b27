//! Canonical multi-value map for HTTP headers and query parameters
//!
//! API Gateway and ALB deliver headers and query strings either as
//! `{"name": "value"}` or as `{"name": ["v1", "v2"]}`. Both shapes are
//! normalized into [`MultiValueMap`].

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Ordered multi-map, keys sorted, values kept in arrival order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MultiValueMap {
    entries: BTreeMap<String, Vec<String>>,
}

impl MultiValueMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lift every value of a single-value map into a one-element sequence
    pub fn from_single(single: HashMap<String, String>) -> Self {
        Self {
            entries: single.into_iter().map(|(k, v)| (k, vec![v])).collect(),
        }
    }

    pub fn from_multi(multi: HashMap<String, Vec<String>>) -> Self {
        Self {
            entries: multi.into_iter().collect(),
        }
    }

    /// Pick the multi-value shape when present, else lift the single-value shape
    ///
    /// Returns `None` when neither shape arrived.
    pub fn reconcile(
        multi: Option<HashMap<String, Vec<String>>>,
        single: Option<HashMap<String, String>>,
    ) -> Option<Self> {
        match (multi, single) {
            (Some(multi), _) => Some(Self::from_multi(multi)),
            (None, Some(single)) => Some(Self::from_single(single)),
            (None, None) => None,
        }
    }

    /// First value for `name`
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// First value for `name`, comparing names ASCII case-insensitively
    pub fn get_ignore_case(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .and_then(|(_, values)| values.first())
            .map(String::as_str)
    }

    pub fn get_all(&self, name: &str) -> &[String] {
        self.entries.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Add a value, keeping any existing ones
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries
            .entry(name.into())
            .or_default()
            .push(value.into());
    }

    /// Replace all values for `name`
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(name.into(), vec![value.into()]);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate `(name, value)` pairs, one per value
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().flat_map(|(name, values)| {
            values
                .iter()
                .map(move |value| (name.as_str(), value.as_str()))
        })
    }

    /// Collapse to a single-value map, the last value for a name wins
    pub fn to_single_value(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .filter_map(|(name, values)| values.last().map(|v| (name.clone(), v.clone())))
            .collect()
    }

    pub fn to_multi_value(&self) -> BTreeMap<String, Vec<String>> {
        self.entries.clone()
    }
}

impl<K, V> FromIterator<(K, V)> for MultiValueMap
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (name, value) in iter {
            map.append(name, value);
        }
        map
    }
}
