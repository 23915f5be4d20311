//! Convenient imports for typical `ctesql` usage.
//!
//! ```ignore
//! use ctesql::prelude::*;
//! ```

pub use crate::{
    BuildOptions, CteError, CteResult, Dialect, GenericClient, Parameters, PersistCache, Query,
    RenderedStatement, Value, q,
};
