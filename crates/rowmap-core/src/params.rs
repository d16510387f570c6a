//! Insertion-ordered bound-parameter map.

use serde::Serialize;

use crate::value::Value;

/// Named parameters bound to a statement, in binding order.
///
/// A thin wrapper over `Vec<(name, value)>`: the compiler and driver only
/// ever append, look up by name, and iterate in order, so a full map type
/// would buy nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Params {
    entries: Vec<(String, Value)>,
}

impl Params {
    /// Empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a binding. Replaces the value if the name already exists.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        if let Some(entry) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            entry.1 = value;
        } else {
            self.entries.push((name, value));
        }
    }

    /// Whether a binding with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    /// Look up a binding by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Append every binding of `other`.
    pub fn extend(&mut self, other: Params) {
        for (name, value) in other.entries {
            self.insert(name, value);
        }
    }

    /// Iterate bindings in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Number of bindings.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no bindings exist.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find a free variant of `base`, appending `__2`, `__3`, ... while the
    /// name collides with this set or with `prior`.
    pub fn unique_name(&self, base: &str, prior: &Params) -> String {
        if !self.contains(base) && !prior.contains(base) {
            return base.to_string();
        }
        let mut n = 2usize;
        loop {
            let candidate = format!("{base}__{n}");
            if !self.contains(&candidate) && !prior.contains(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }
}

impl FromIterator<(String, Value)> for Params {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (name, value) in iter {
            params.insert(name, value);
        }
        params
    }
}
