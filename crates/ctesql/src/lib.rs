//! # ctesql
//!
//! Compose SQL as immutable query trees and compile them into one statement.
//!
//! ## Features
//!
//! - **Composable**: a query may embed other queries and parameters; embedded
//!   queries become common table expressions
//! - **Identity dedup**: a sub-query referenced many times is emitted once
//! - **Dialect-aware parameters**: `?`, `:1` or `$1` placeholders, with named
//!   parameters reusing one numbered slot
//! - **Reparameterization**: build the same tree with different parameter values
//! - **Persistence**: mark expensive sub-queries to be saved once (per content)
//!   and read back cheaply, even under concurrent builds
//!
//! ```ignore
//! use ctesql::prelude::*;
//!
//! let mut p = Parameters::new();
//! let status = p.add_named("status", "active")?;
//!
//! let active = q("select id from users where status = ")
//!     .push_param(&status)
//!     .finish()?;
//! let orders = q("select * from orders where user_id in (select id from ")
//!     .push_query(&active)
//!     .push(")")
//!     .dialect(Dialect::POSTGRES)
//!     .finish()?;
//!
//! let stmt = orders.build()?;
//! let rows = stmt.fetch_all(&client).await?;
//! ```

pub mod client;
pub mod dialect;
pub mod error;
pub mod params;
pub mod persist;
pub mod prelude;
pub mod query;
pub mod render;
pub mod value;

pub use client::GenericClient;
pub use dialect::{Dialect, LimitStyle, ParamStyle};
pub use error::{CteError, CteResult};
pub use params::{ParamContext, ParamKey, ParameterPlaceholder, Parameters};
pub use persist::{CacheKey, Cacher, Persist, PersistCache, TempTableCacher};
pub use query::{
    Extension, Inherit, PreBuildHook, Query, QueryBuilder, QueryId, QueryPart, dependencies, q,
    rewrite, rewrite_async, rewrite_parts,
};
pub use render::{
    BuildOptions, ColonNumeric, CteRenderer, DollarNumeric, KeyName, Overrides, ParamList,
    ParamRenderer, PlaceholderStyle, QMark, QueryRenderer, RenderedStatement,
};
pub use value::Value;
