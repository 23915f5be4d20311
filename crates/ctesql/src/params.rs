//! Named and positional query parameters.
//!
//! ```ignore
//! use ctesql::{Parameters, q};
//!
//! let mut p = Parameters::new();
//! let start = p.add_named("start", chrono::NaiveDate::from_ymd_opt(2019, 1, 1))?;
//! let ids = p.add_named("ids", vec![1, 2, 3])?;
//!
//! let query = q("select * from customers where created_on > ")
//!     .push_param(&start)
//!     .push(" and id in ")
//!     .push_param(&ids)
//!     .finish()?;
//! ```

use crate::error::{CteError, CteResult};
use crate::value::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CONTEXT: AtomicU64 = AtomicU64::new(1);

/// Identity of one [`Parameters`] instance.
///
/// Two parameter sets using the same key string never collide because their
/// placeholders carry different contexts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParamContext(u64);

impl ParamContext {
    fn next() -> Self {
        ParamContext(NEXT_CONTEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// The key of a parameter: an explicit name, or one generated by [`Parameters::add`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParamKey {
    Named(Arc<str>),
    Auto(u32),
}

impl ParamKey {
    /// The explicit name, if this key has one.
    pub fn name(&self) -> Option<&str> {
        match self {
            ParamKey::Named(name) => Some(name),
            ParamKey::Auto(_) => None,
        }
    }
}

impl fmt::Display for ParamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamKey::Named(name) => f.write_str(name),
            ParamKey::Auto(i) => write!(f, "_add_{i}"),
        }
    }
}

/// A reference to one entry of a [`Parameters`] collection, ready to embed in a query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParameterPlaceholder {
    key: ParamKey,
    value: Value,
    context: ParamContext,
}

impl ParameterPlaceholder {
    pub fn key(&self) -> &ParamKey {
        &self.key
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn context(&self) -> ParamContext {
        self.context
    }

    /// Identity used to reuse a rendered placeholder within one statement.
    pub(crate) fn identity(&self) -> (ParamContext, ParamKey) {
        (self.context, self.key.clone())
    }
}

/// A mapping from key to value that hands out [`ParameterPlaceholder`]s.
///
/// Keys cannot be re-used once added. Collection values must contain scalars only.
#[derive(Debug)]
pub struct Parameters {
    context: ParamContext,
    values: HashMap<ParamKey, Value>,
    next_auto: u32,
}

impl Default for Parameters {
    fn default() -> Self {
        Self::new()
    }
}

impl Parameters {
    /// Create an empty parameter set with a fresh context.
    pub fn new() -> Self {
        Self {
            context: ParamContext::next(),
            values: HashMap::new(),
            next_auto: 0,
        }
    }

    /// Create a parameter set from `(name, value)` pairs.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> CteResult<Self>
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let mut params = Self::new();
        for (key, value) in pairs {
            params.add_named(key, value)?;
        }
        Ok(params)
    }

    pub fn context(&self) -> ParamContext {
        self.context
    }

    /// Add a value under an auto-generated key and return its placeholder.
    pub fn add(&mut self, value: impl Into<Value>) -> CteResult<ParameterPlaceholder> {
        let key = ParamKey::Auto(self.next_auto);
        self.next_auto += 1;
        self.insert(key, value.into())
    }

    /// Add a value under an explicit name and return its placeholder.
    pub fn add_named(
        &mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> CteResult<ParameterPlaceholder> {
        let key = ParamKey::Named(Arc::from(key.into()));
        self.insert(key, value.into())
    }

    /// Look up the placeholder for a named parameter.
    pub fn get(&self, key: &str) -> CteResult<ParameterPlaceholder> {
        let key = ParamKey::Named(Arc::from(key));
        match self.values.get(&key) {
            Some(value) => Ok(self.placeholder(key, value.clone())),
            None => Err(CteError::not_found(key.to_string())),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(&ParamKey::Named(Arc::from(key)))
    }

    /// Explicit names of the parameters in this set, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().filter_map(ParamKey::name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn insert(&mut self, key: ParamKey, value: Value) -> CteResult<ParameterPlaceholder> {
        if let Some(existing) = self.values.get(&key) {
            return Err(CteError::DuplicateParam {
                key: key.to_string(),
                existing: existing.to_string(),
            });
        }
        if value.nested_list() {
            return Err(CteError::InvalidParam {
                key: key.to_string(),
                message: format!("collection {value} contains a nested collection"),
            });
        }
        self.values.insert(key.clone(), value.clone());
        Ok(self.placeholder(key, value))
    }

    fn placeholder(&self, key: ParamKey, value: Value) -> ParameterPlaceholder {
        ParameterPlaceholder {
            key,
            value,
            context: self.context,
        }
    }
}
