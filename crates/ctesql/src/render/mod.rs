//! Rendering query trees into executable statements.
//!
//! A build resolves two strategies: a [`PlaceholderStyle`] chosen by the dialect's
//! paramstyle, and a [`QueryRenderer`] (by default [`CteRenderer`]). Either can be
//! swapped per query or per build with [`Overrides`].

mod build;
mod cte;
mod param;
mod statement;

#[cfg(test)]
mod tests;

pub use build::BuildOptions;
pub(crate) use build::BuildPlan;
pub use cte::{CteRenderer, QueryRenderer, render_parts};
pub use param::{
    ColonNumeric, DollarNumeric, KeyName, ParamList, ParamRenderer, PlaceholderStyle, QMark,
};
pub use statement::RenderedStatement;

use std::sync::Arc;

/// Replacement rendering strategies.
///
/// Unset fields fall back to what the dialect selects.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub param_style: Option<Arc<dyn PlaceholderStyle>>,
    pub query_renderer: Option<Arc<dyn QueryRenderer>>,
}

impl Overrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render placeholders with `style`.
    pub fn param_style(mut self, style: impl PlaceholderStyle + 'static) -> Self {
        self.param_style = Some(Arc::new(style));
        self
    }

    /// Assemble statements with `renderer`.
    pub fn query_renderer(mut self, renderer: impl QueryRenderer + 'static) -> Self {
        self.query_renderer = Some(Arc::new(renderer));
        self
    }
}

fn same_strategy<T: ?Sized>(a: &Option<Arc<T>>, b: &Option<Arc<T>>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        _ => false,
    }
}

/// Two overrides are equal when they hold the same strategy instances.
impl PartialEq for Overrides {
    fn eq(&self, other: &Self) -> bool {
        same_strategy(&self.param_style, &other.param_style)
            && same_strategy(&self.query_renderer, &other.query_renderer)
    }
}
