use super::param::ParamRenderer;
use crate::error::{CteError, CteResult};
use crate::query::{Query, QueryId, QueryPart};
use std::collections::HashMap;
use std::fmt;

/// Assembles a query tree into one SQL statement.
pub trait QueryRenderer: fmt::Debug + Send + Sync {
    /// Render `query` and everything it depends on. Placeholders go through `params`.
    fn render(&self, query: &Query, params: &mut ParamRenderer) -> CteResult<String>;
}

/// Renders every dependency as a named CTE under one `with` clause.
///
/// ```text
/// with
/// _subQuery0 as (
///     select 1
/// )
/// select 2 join _subQuery0
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct CteRenderer;

impl QueryRenderer for CteRenderer {
    fn render(&self, query: &Query, params: &mut ParamRenderer) -> CteResult<String> {
        let deps = query.dependencies();
        if deps.is_empty() {
            return render_parts(query, &HashMap::new(), params);
        }

        let names: HashMap<QueryId, String> = deps
            .iter()
            .enumerate()
            .map(|(i, dep)| (dep.id(), format!("_subQuery{i}")))
            .collect();

        let mut ctes = Vec::with_capacity(deps.len());
        for dep in &deps {
            let body = render_parts(dep, &names, params)?;
            let body = dedent(&body);
            ctes.push(format!(
                "{} as (\n{}\n)",
                names[&dep.id()],
                indent(body.trim(), "\t")
            ));
        }

        let root = render_parts(query, &names, params)?;
        Ok(format!("with\n{}\n{}", ctes.join(",\n"), dedent(&root).trim()))
    }
}

/// Concatenate a single node's parts. Sub-queries become the names in `names`.
pub fn render_parts(
    query: &Query,
    names: &HashMap<QueryId, String>,
    params: &mut ParamRenderer,
) -> CteResult<String> {
    let mut sql = String::new();
    for part in query.parts() {
        match part {
            QueryPart::Sql(text) => sql.push_str(text),
            QueryPart::Query(child) => match names.get(&child.id()) {
                Some(name) => sql.push_str(name),
                None => {
                    return Err(CteError::render(format!(
                        "no CTE name assigned to sub-query {:?}",
                        child.id()
                    )));
                }
            },
            QueryPart::Param(param) => sql.push_str(&params.render(param)?),
        }
    }
    Ok(sql)
}

/// Remove whitespace common to the start of every non-blank line.
///
/// Blank lines are emptied and do not count toward the common prefix.
pub(crate) fn dedent(text: &str) -> String {
    let mut margin: Option<&str> = None;
    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let ws = &line[..line.len() - line.trim_start().len()];
        margin = Some(match margin {
            None => ws,
            Some(current) => common_prefix(current, ws),
        });
    }
    let margin = margin.unwrap_or("");

    text.split('\n')
        .map(|line| {
            if line.trim().is_empty() {
                ""
            } else {
                line.strip_prefix(margin).unwrap_or(line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn common_prefix<'a>(a: &'a str, b: &str) -> &'a str {
    let end = a
        .char_indices()
        .zip(b.chars())
        .find(|((_, ca), cb)| ca != cb)
        .map(|((i, _), _)| i)
        .unwrap_or_else(|| a.len().min(b.len()));
    &a[..end]
}

/// Prefix every non-blank line with `prefix`.
pub(crate) fn indent(text: &str, prefix: &str) -> String {
    text.split('\n')
        .map(|line| {
            if line.trim().is_empty() {
                line.to_string()
            } else {
                format!("{prefix}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
