use super::{Query, QueryId, QueryPart};
use std::collections::HashSet;

/// All sub-queries reachable from `root`, excluding `root` itself.
///
/// Every query appears after the queries it embeds, and each distinct node
/// (by identity) appears once, at its first position. This is a valid order
/// for emitting CTEs.
pub fn dependencies(root: &Query) -> Vec<Query> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    collect(root, &mut seen, &mut out);
    out
}

fn collect(query: &Query, seen: &mut HashSet<QueryId>, out: &mut Vec<Query>) {
    for part in query.parts() {
        let QueryPart::Query(child) = part else {
            continue;
        };
        // An emitted node already has all of its own dependencies emitted before it.
        if seen.contains(&child.id()) {
            continue;
        }
        collect(child, seen, out);
        seen.insert(child.id());
        out.push(child.clone());
    }
}
