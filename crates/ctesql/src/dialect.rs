//! SQL dialect settings.
//!
//! A [`Dialect`] only decides two things: how parameter placeholders are written
//! and how preview queries are row-limited. Dialects deserialize from config
//! (`{ paramstyle = "numeric_dollar", limit = "limit" }`) or parse from a name
//! (`"postgres".parse::<Dialect>()`); unknown values are configuration errors.

use crate::error::CteError;
use crate::render::{ColonNumeric, DollarNumeric, PlaceholderStyle, QMark};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// How parameter placeholders are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamStyle {
    /// `?`
    Qmark,
    /// `:1`, `:2`, ...
    Numeric,
    /// `$1`, `$2`, ...
    NumericDollar,
}

impl ParamStyle {
    /// The placeholder style that renders this paramstyle.
    pub fn placeholder_style(self) -> Arc<dyn PlaceholderStyle> {
        match self {
            ParamStyle::Qmark => Arc::new(QMark),
            ParamStyle::Numeric => Arc::new(ColonNumeric),
            ParamStyle::NumericDollar => Arc::new(DollarNumeric),
        }
    }
}

impl FromStr for ParamStyle {
    type Err = CteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "qmark" => Ok(ParamStyle::Qmark),
            "numeric" => Ok(ParamStyle::Numeric),
            "numeric_dollar" => Ok(ParamStyle::NumericDollar),
            other => Err(CteError::config(format!("unknown paramstyle '{other}'"))),
        }
    }
}

/// How preview queries limit their rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitStyle {
    /// `select * from q limit n`
    Limit,
    /// `select top(n) * from q`
    TopN,
    /// `select * from q fetch first n rows only`
    #[serde(alias = "ansi")]
    FetchFirst,
}

impl FromStr for LimitStyle {
    type Err = CteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "limit" => Ok(LimitStyle::Limit),
            "top_n" => Ok(LimitStyle::TopN),
            "fetch_first" | "ansi" => Ok(LimitStyle::FetchFirst),
            other => Err(CteError::config(format!("unknown limit style '{other}'"))),
        }
    }
}

/// Settings of a SQL dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub struct Dialect {
    #[serde(default = "default_paramstyle")]
    pub paramstyle: ParamStyle,
    #[serde(default = "default_limit")]
    pub limit: LimitStyle,
}

fn default_paramstyle() -> ParamStyle {
    Dialect::DEFAULT.paramstyle
}

fn default_limit() -> LimitStyle {
    Dialect::DEFAULT.limit
}

impl Dialect {
    pub const DEFAULT: Dialect = Dialect::new(ParamStyle::Numeric, LimitStyle::Limit);
    pub const SNOWFLAKE: Dialect = Dialect::new(ParamStyle::Numeric, LimitStyle::Limit);
    pub const DUCKDB: Dialect = Dialect::new(ParamStyle::NumericDollar, LimitStyle::Limit);
    pub const MSSQL: Dialect = Dialect::new(ParamStyle::Numeric, LimitStyle::TopN);
    pub const POSTGRES: Dialect = Dialect::new(ParamStyle::NumericDollar, LimitStyle::Limit);
    pub const SQLITE: Dialect = Dialect::new(ParamStyle::Qmark, LimitStyle::Limit);
    pub const ANSI: Dialect = Dialect::new(ParamStyle::Numeric, LimitStyle::FetchFirst);

    pub const fn new(paramstyle: ParamStyle, limit: LimitStyle) -> Self {
        Self { paramstyle, limit }
    }

    /// Replace the paramstyle.
    pub const fn with_paramstyle(mut self, paramstyle: ParamStyle) -> Self {
        self.paramstyle = paramstyle;
        self
    }

    /// Replace the limit style.
    pub const fn with_limit(mut self, limit: LimitStyle) -> Self {
        self.limit = limit;
        self
    }
}

impl Default for Dialect {
    fn default() -> Self {
        Dialect::DEFAULT
    }
}

impl FromStr for Dialect {
    type Err = CteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" => Ok(Dialect::DEFAULT),
            "snowflake" => Ok(Dialect::SNOWFLAKE),
            "duckdb" => Ok(Dialect::DUCKDB),
            "mssql" | "sqlserver" => Ok(Dialect::MSSQL),
            "postgres" | "postgresql" => Ok(Dialect::POSTGRES),
            "sqlite" => Ok(Dialect::SQLITE),
            "ansi" => Ok(Dialect::ANSI),
            other => Err(CteError::config(format!("unknown dialect '{other}'"))),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Dialect({:?}, {:?})", self.paramstyle, self.limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_names() {
        assert_eq!("postgres".parse::<Dialect>().unwrap(), Dialect::POSTGRES);
        assert_eq!(" DuckDB ".parse::<Dialect>().unwrap(), Dialect::DUCKDB);
        assert_eq!("top_n".parse::<LimitStyle>().unwrap(), LimitStyle::TopN);
        assert_eq!("qmark".parse::<ParamStyle>().unwrap(), ParamStyle::Qmark);
    }

    #[test]
    fn unknown_names_fail_fast() {
        assert!("oracle".parse::<Dialect>().unwrap_err().is_config());
        assert!("pyformat".parse::<ParamStyle>().unwrap_err().is_config());
        assert!("offset".parse::<LimitStyle>().unwrap_err().is_config());
    }

    #[test]
    fn deserializes_with_defaults() {
        let d: Dialect = serde_json::from_str(r#"{"paramstyle": "qmark"}"#).unwrap();
        assert_eq!(d, Dialect::new(ParamStyle::Qmark, LimitStyle::Limit));

        let d: Dialect = serde_json::from_str(r#"{"limit": "ansi"}"#).unwrap();
        assert_eq!(d, Dialect::ANSI);

        assert!(serde_json::from_str::<Dialect>(r#"{"paramstyle": "format"}"#).is_err());
    }
}
