//! Insertion-ordered protocol parameter map.
//!
//! Inbound requests and outbound responses are both maps from parameter name
//! to a JSON-shaped value. Keys are unique; a multi-valued parameter is an
//! array value. Insertion order is preserved so a cached request replays
//! byte-for-byte, but equality is order-independent (set semantics).

use serde_json::Value;

/// Ordered map of protocol parameters with unique keys.
///
/// Values are [`serde_json::Value`] so string, integer, boolean, null,
/// array, and object shapes all survive a cache round-trip without being
/// collapsed to strings.
#[derive(Debug, Clone, Default)]
pub struct ParameterMap {
    entries: Vec<(String, Value)>,
}

impl ParameterMap {
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map holds no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get a parameter value by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    /// Get a parameter as a string slice, if it is a JSON string.
    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Whether a parameter with the given name exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == name)
    }

    /// Insert a parameter, replacing any existing value under the same name.
    ///
    /// Replacement keeps the original slot so iteration order is stable.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Insert a parameter only if no value exists under the same name.
    ///
    /// Returns `true` if the value was inserted. Used when replaying cached
    /// parameters: parameters added after caching must not be overwritten.
    pub fn insert_missing(&mut self, name: impl Into<String>, value: Value) -> bool {
        let name = name.into();
        if self.contains(&name) {
            return false;
        }
        self.entries.push((name, value));
        true
    }

    /// Remove a parameter by name, returning its value if present.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let idx = self.entries.iter().position(|(k, _)| k == name)?;
        Some(self.entries.remove(idx).1)
    }

    /// Iterate over `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Order-independent equality against another map.
    ///
    /// Two maps are set-equal when they contain the same names mapped to
    /// equal values, regardless of insertion order.
    #[must_use]
    pub fn set_eq(&self, other: &ParameterMap) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(name, value)| other.get(name) == Some(value))
    }
}

impl<S: Into<String>> FromIterator<(S, Value)> for ParameterMap {
    fn from_iter<T: IntoIterator<Item = (S, Value)>>(iter: T) -> Self {
        let mut map = Self::new();
        for (name, value) in iter {
            map.insert(name, value);
        }
        map
    }
}
