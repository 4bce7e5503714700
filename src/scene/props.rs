//! Flat, already-resolved per-frame element properties.

use std::collections::BTreeMap;

/// One scalar property value.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum PropValue {
    /// Boolean flag.
    Bool(bool),
    /// Numeric value.
    Number(f64),
    /// String value.
    Text(String),
}

impl From<f64> for PropValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<bool> for PropValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for PropValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

/// String-keyed map of scalar properties with typed, `Option`-returning accessors.
///
/// Keys may carry a modifier prefix (e.g. `altx`) to select an alternate rectangle.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct FlatProps(BTreeMap<String, PropValue>);

impl FlatProps {
    /// Empty property map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<PropValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Raw value lookup.
    pub fn get(&self, key: &str) -> Option<&PropValue> {
        self.0.get(key)
    }

    /// Return `true` when `key` is present.
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Return `true` when there are no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Finite numeric value; numeric strings are accepted.
    pub fn number(&self, key: &str) -> Option<f64> {
        let v = match self.0.get(key)? {
            PropValue::Number(n) => *n,
            PropValue::Text(s) => s.trim().parse::<f64>().ok()?,
            PropValue::Bool(_) => return None,
        };
        v.is_finite().then_some(v)
    }

    /// [`Self::number`] with a default.
    pub fn number_or(&self, key: &str, default: f64) -> f64 {
        self.number(key).unwrap_or(default)
    }

    /// String value; numbers are rendered without a trailing `.0` for integral values.
    pub fn text(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            PropValue::Text(s) => Some(s.clone()),
            PropValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                Some(format!("{}", *n as i64))
            }
            PropValue::Number(n) => Some(n.to_string()),
            PropValue::Bool(b) => Some(b.to_string()),
        }
    }

    /// [`Self::text`] with a default.
    pub fn text_or(&self, key: &str, default: &str) -> String {
        self.text(key).unwrap_or_else(|| default.to_owned())
    }

    /// Boolean value; `0`/`1` numbers and `"true"`/`"false"` strings are accepted.
    pub fn flag(&self, key: &str) -> Option<bool> {
        match self.0.get(key)? {
            PropValue::Bool(b) => Some(*b),
            PropValue::Number(n) => Some(*n != 0.0),
            PropValue::Text(s) => s.trim().parse::<bool>().ok(),
        }
    }

    /// Copy of `self` with every entry of `top` replacing or adding to it.
    pub fn overlay(&self, top: &FlatProps) -> FlatProps {
        let mut out = self.clone();
        for (k, v) in &top.0 {
            out.0.insert(k.clone(), v.clone());
        }
        out
    }

    /// Iterate entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>, V: Into<PropValue>> FromIterator<(K, V)> for FlatProps {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut out = Self::default();
        for (k, v) in iter {
            out.insert(k, v);
        }
        out
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/props.rs"]
mod tests;
