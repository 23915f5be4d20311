//! Placeholder rendering and bound-value collection.

use crate::error::{CteError, CteResult};
use crate::params::{ParamContext, ParamKey, ParameterPlaceholder};
use crate::value::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio_postgres::types::ToSql;

/// Writes the placeholder text for one value slot.
///
/// `index` is the 0-based position of the slot in the final value vector. `key`
/// is the parameter's key for scalar parameters and `None` for the elements of
/// an expanded collection.
pub trait PlaceholderStyle: fmt::Debug + Send + Sync {
    fn placeholder(&self, index: usize, key: Option<&ParamKey>) -> CteResult<String>;

    /// Whether a parameter used several times may share one rendered placeholder.
    ///
    /// Positional styles must return `false`: every occurrence needs its own slot.
    fn reuses_slots(&self) -> bool {
        false
    }
}

/// `?`
#[derive(Debug, Clone, Copy, Default)]
pub struct QMark;

impl PlaceholderStyle for QMark {
    fn placeholder(&self, _index: usize, _key: Option<&ParamKey>) -> CteResult<String> {
        Ok("?".to_string())
    }
}

/// `:1`, `:2`, ...
#[derive(Debug, Clone, Copy, Default)]
pub struct ColonNumeric;

impl PlaceholderStyle for ColonNumeric {
    fn placeholder(&self, index: usize, _key: Option<&ParamKey>) -> CteResult<String> {
        Ok(format!(":{}", index + 1))
    }

    fn reuses_slots(&self) -> bool {
        true
    }
}

/// `$1`, `$2`, ... (Postgres, DuckDB)
#[derive(Debug, Clone, Copy, Default)]
pub struct DollarNumeric;

impl PlaceholderStyle for DollarNumeric {
    fn placeholder(&self, index: usize, _key: Option<&ParamKey>) -> CteResult<String> {
        Ok(format!("${}", index + 1))
    }

    fn reuses_slots(&self) -> bool {
        true
    }
}

/// Renders each parameter as its own name.
///
/// Used for bodies of user-defined functions, where parameters are referenced by
/// argument name. Every parameter must be named, so collections are rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyName;

impl PlaceholderStyle for KeyName {
    fn placeholder(&self, _index: usize, key: Option<&ParamKey>) -> CteResult<String> {
        match key.and_then(ParamKey::name) {
            Some(name) => Ok(name.to_string()),
            None => Err(CteError::config(
                "all parameters must be named to render them by key; collection parameters are not supported",
            )),
        }
    }

    fn reuses_slots(&self) -> bool {
        true
    }
}

/// Bound values in slot order, with the name each slot was bound under.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamList {
    values: Vec<Value>,
    names: Vec<Option<String>>,
}

impl ParamList {
    /// Create a new empty parameter list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value and return its 0-based slot index.
    pub fn push(&mut self, value: Value, name: Option<&str>) -> usize {
        self.values.push(value);
        self.names.push(name.map(str::to_string));
        self.values.len() - 1
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn names(&self) -> &[Option<String>] {
        &self.names
    }

    pub(crate) fn values_mut(&mut self) -> &mut [Value] {
        &mut self.values
    }

    /// Get all parameters as references for tokio-postgres.
    pub fn as_refs(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.values.iter().map(|v| v as &(dyn ToSql + Sync)).collect()
    }

    pub fn into_parts(self) -> (Vec<Value>, Vec<Option<String>>) {
        (self.values, self.names)
    }
}

/// Single-use renderer for the placeholders of one statement.
///
/// Values are collected in the order placeholders are rendered, which is the
/// order they appear in the final SQL.
pub struct ParamRenderer {
    style: Arc<dyn PlaceholderStyle>,
    params: ParamList,
    rendered: HashMap<(ParamContext, ParamKey), String>,
}

impl ParamRenderer {
    pub fn new(style: Arc<dyn PlaceholderStyle>) -> Self {
        Self {
            style,
            params: ParamList::new(),
            rendered: HashMap::new(),
        }
    }

    /// Render one placeholder occurrence and bind its value(s).
    pub fn render(&mut self, param: &ParameterPlaceholder) -> CteResult<String> {
        if !self.style.reuses_slots() {
            return self.render_fresh(param);
        }

        let identity = param.identity();
        if let Some(sql) = self.rendered.get(&identity) {
            return Ok(sql.clone());
        }
        let sql = self.render_fresh(param)?;
        self.rendered.insert(identity, sql.clone());
        Ok(sql)
    }

    fn render_fresh(&mut self, param: &ParameterPlaceholder) -> CteResult<String> {
        match param.value() {
            Value::List(items) if items.is_empty() => Ok("( NULL )".to_string()),
            Value::List(items) => {
                let mut slots = Vec::with_capacity(items.len());
                for item in items {
                    let index = self.params.push(item.clone(), None);
                    slots.push(self.style.placeholder(index, None)?);
                }
                Ok(format!("( {} )", slots.join(",")))
            }
            value => {
                let key = param.key();
                let index = self.params.push(value.clone(), key.name());
                self.style.placeholder(index, Some(key))
            }
        }
    }

    /// Number of value slots bound so far.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn finish(self) -> ParamList {
        self.params
    }
}

impl fmt::Debug for ParamRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParamRenderer")
            .field("style", &self.style)
            .field("slots", &self.params.len())
            .finish()
    }
}
