use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Case-insensitive HTTP header map.
///
/// Names are stored lowercased so lookups such as `ETag` / `etag` agree, and
/// ordered so request descriptors built from the same state are identical.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct Headers {
    inner: BTreeMap<String, String>,
}

impl Headers {
    pub fn new() -> Self { Self::default() }

    /// Insert a header, replacing any previous value with the same name.
    pub fn insert(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.inner.insert(name.as_ref().to_ascii_lowercase(), value.into());
    }

    /// Builder form of [`Headers::insert`].
    #[must_use]
    pub fn with(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool { self.get(name).is_some() }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize { self.inner.len() }

    pub fn is_empty(&self) -> bool { self.inner.is_empty() }

    /// Returns a new map holding `self` overlaid with `other`.
    ///
    /// Neither input is modified; entries in `other` win on conflict.
    #[must_use]
    pub fn merged(&self, other: &Headers) -> Headers {
        let mut inner = self.inner.clone();
        inner.extend(other.inner.iter().map(|(k, v)| (k.clone(), v.clone())));
        Headers { inner }
    }
}

impl From<BTreeMap<String, String>> for Headers {
    fn from(map: BTreeMap<String, String>) -> Self { map.into_iter().collect() }
}

impl From<Headers> for BTreeMap<String, String> {
    fn from(headers: Headers) -> Self { headers.inner }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (k, v) in iter {
            headers.insert(k, v);
        }
        headers
    }
}
