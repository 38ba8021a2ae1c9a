use serde::{Deserialize, Serialize};

/// Insertion-ordered string map of route arguments.
///
/// Order matters: positional invocation passes the values in the order the
/// arguments were first set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteArguments(Vec<(String, String)>);

impl RouteArguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Set a value, keeping the original position when the name exists.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(key, _)| *key == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
    }

    /// Overlay `other`; its values win.
    pub fn merge(&mut self, other: &RouteArguments) {
        for (name, value) in other.iter() {
            self.insert(name, value);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn values(&self) -> Vec<String> {
        self.0.iter().map(|(_, v)| v.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RouteArguments {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut arguments = Self::new();
        for (name, value) in iter {
            arguments.insert(name, value);
        }
        arguments
    }
}

impl<K: Into<String>, V: Into<String>, const N: usize> From<[(K, V); N]> for RouteArguments {
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_keeps_position() {
        let mut args = RouteArguments::from([("extra", "there"), ("name", "world!")]);
        args.insert("name", "test!");
        args.insert("id", "7");

        assert_eq!(args.values(), vec!["there", "test!", "7"]);
        assert_eq!(args.get("name"), Some("test!"));
    }

    #[test]
    fn test_merge_overrides() {
        let mut args = RouteArguments::from([("a", "1"), ("b", "2")]);
        args.merge(&RouteArguments::from([("b", "3")]));
        assert_eq!(args.get("a"), Some("1"));
        assert_eq!(args.get("b"), Some("3"));
        assert_eq!(args.len(), 2);
    }
}
