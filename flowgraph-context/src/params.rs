//! 参数集合：只读、写时复制

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Immutable key/value parameters handed down through nested flows.
///
/// Cloning is cheap; every merge produces a new value so an override made for
/// one child can never be observed by its siblings or its parent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(Arc<HashMap<String, Value>>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Deserialize a parameter into `T`; `Ok(None)` when the key is absent.
    pub fn get_as<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> serde_json::Result<Option<T>> {
        self.0
            .get(key)
            .map(|value| T::deserialize(value))
            .transpose()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Returns a copy of these params with `key` set to `value`.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        Arc::make_mut(&mut self.0).insert(key.into(), value.into());
        self
    }

    /// Layer `overrides` on top of `self`; keys in `overrides` win.
    pub fn merge(&self, overrides: &Params) -> Params {
        if overrides.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            return overrides.clone();
        }
        let mut merged = (*self.0).clone();
        merged.extend(
            overrides.0.iter().map(|(k, v)| (k.clone(), v.clone())),
        );
        Params(Arc::new(merged))
    }
}

impl From<HashMap<String, Value>> for Params {
    fn from(map: HashMap<String, Value>) -> Self {
        Params(Arc::new(map))
    }
}

impl<K, V> FromIterator<(K, V)> for Params
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Params(Arc::new(
            iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        ))
    }
}

/// Builds [`Params`] from `key => value` pairs.
///
/// ```
/// let p = flowgraph_context::params! { "x" => 1, "name" => "demo" };
/// assert_eq!(p.len(), 2);
/// ```
#[macro_export]
macro_rules! params {
    () => { $crate::Params::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {
        $crate::Params::new()$(.with($key, $crate::serde_json::json!($value)))+
    };
}
