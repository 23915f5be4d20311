//! Bottom-up tree rewriting.
//!
//! [`rewrite`] applies a transform to every distinct node of a tree exactly once,
//! children first, so a transform always sees a node whose sub-queries have
//! already been rewritten. Nodes are memoized by identity: a node shared by
//! several parents is transformed once and the result is shared again.

use super::deps::dependencies;
use super::{Query, QueryId, QueryPart};
use crate::error::{CteError, CteResult};
use crate::params::Parameters;
use crate::value::Value;
use std::collections::{HashMap, HashSet};
use std::future::Future;

/// Rewrite every distinct node of `root` with `transform`, leaves first.
///
/// Returns `root` itself (same identity) when nothing changes.
pub fn rewrite<F>(root: &Query, mut transform: F) -> CteResult<Query>
where
    F: FnMut(Query) -> CteResult<Query>,
{
    let mut done: HashMap<QueryId, Query> = HashMap::new();
    for node in dependencies(root) {
        let rewritten = transform(relink(&node, &done))?;
        done.insert(node.id(), rewritten);
    }
    transform(relink(root, &done))
}

/// Async variant of [`rewrite`], for transforms that perform I/O.
pub async fn rewrite_async<F, Fut>(root: &Query, mut transform: F) -> CteResult<Query>
where
    F: FnMut(Query) -> Fut,
    Fut: Future<Output = CteResult<Query>>,
{
    let mut done: HashMap<QueryId, Query> = HashMap::new();
    for node in dependencies(root) {
        let rewritten = transform(relink(&node, &done)).await?;
        done.insert(node.id(), rewritten);
    }
    transform(relink(root, &done)).await
}

/// Rewrite the parts of a single node without recursing into sub-queries.
///
/// `replace` returns `Some(part)` to swap a part. If no part actually changes,
/// the original node is returned unchanged.
pub fn rewrite_parts<F>(query: &Query, mut replace: F) -> CteResult<Query>
where
    F: FnMut(&QueryPart) -> CteResult<Option<QueryPart>>,
{
    let mut changed = false;
    let mut parts = Vec::with_capacity(query.parts().len());
    for part in query.parts() {
        match replace(part)? {
            Some(new_part) if new_part != *part => {
                changed = true;
                parts.push(new_part);
            }
            _ => parts.push(part.clone()),
        }
    }

    if changed {
        Ok(query.with_parts(parts))
    } else {
        Ok(query.clone())
    }
}

/// Point a node's sub-query parts at their rewritten versions.
fn relink(node: &Query, done: &HashMap<QueryId, Query>) -> Query {
    let relinked = rewrite_parts(node, |part| match part {
        QueryPart::Query(child) => Ok(done.get(&child.id()).cloned().map(QueryPart::Query)),
        _ => Ok(None),
    });
    // The closure never fails.
    relinked.unwrap_or_else(|_| node.clone())
}

/// Replace named placeholders whose key appears in `new_params`.
///
/// Placeholders match by name, whichever parameter set they came from.
/// Every key in `new_params` must match at least one placeholder. A collection
/// may only be replaced by a collection of the same length, and a scalar only
/// by a scalar, so the rendered SQL keeps its shape.
pub fn substitute_params(root: &Query, new_params: &Parameters) -> CteResult<Query> {
    if new_params.is_empty() {
        return Ok(root.clone());
    }

    let mut matched: HashSet<String> = HashSet::new();
    let rewritten = rewrite(root, |node| {
        rewrite_parts(&node, |part| {
            let QueryPart::Param(param) = part else {
                return Ok(None);
            };
            let Some(name) = param.key().name() else {
                return Ok(None);
            };
            if !new_params.contains(name) {
                return Ok(None);
            }
            let replacement = new_params.get(name)?;
            check_shape(name, param.value(), replacement.value())?;
            matched.insert(name.to_string());
            Ok(Some(QueryPart::Param(replacement)))
        })
    })?;

    let mut missing: Vec<&str> = new_params
        .names()
        .filter(|name| !matched.contains(*name))
        .collect();
    missing.sort_unstable();
    if let Some(name) = missing.first() {
        return Err(CteError::not_found(*name));
    }
    Ok(rewritten)
}

fn check_shape(key: &str, original: &Value, replacement: &Value) -> CteResult<()> {
    let same_shape = match (original, replacement) {
        (Value::List(a), Value::List(b)) => a.len() == b.len(),
        (Value::List(_), _) | (_, Value::List(_)) => false,
        _ => true,
    };
    if same_shape {
        Ok(())
    } else {
        Err(CteError::LengthMismatch {
            key: key.to_string(),
            original: original.to_string(),
            replacement: replacement.to_string(),
        })
    }
}

/// Run every node's pre-build hook, replacing nodes whose hook returns a query.
pub fn run_pre_build_hooks(root: &Query) -> CteResult<Query> {
    rewrite(root, |node| {
        let Some(hook) = node.pre_build_hook().cloned() else {
            return Ok(node);
        };
        Ok(hook()?.unwrap_or(node))
    })
}
