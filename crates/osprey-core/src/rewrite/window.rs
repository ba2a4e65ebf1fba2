//! Merges adjacent skip/limit windows into one node. The inner window
//! applies first: skips add, and the outer limit is taken against what the
//! inner window left visible.

use crate::{ir::Node, rewrite::descend};

pub(super) fn apply(node: Node) -> (Node, bool) {
    let (node, changed) = descend(node, apply);

    match node {
        Node::SkipLimit {
            source,
            skip: outer_skip,
            limit: outer_limit,
        } => match *source {
            Node::SkipLimit {
                source: inner,
                skip: inner_skip,
                limit: inner_limit,
            } => {
                let (skip, limit) =
                    merge(inner_skip, inner_limit, outer_skip, outer_limit);
                (
                    Node::SkipLimit {
                        source: inner,
                        skip,
                        limit,
                    },
                    true,
                )
            }
            other => (
                Node::SkipLimit {
                    source: Box::new(other),
                    skip: outer_skip,
                    limit: outer_limit,
                },
                changed,
            ),
        },
        other => (other, changed),
    }
}

/// Combine an inner window with an outer one applied to its output.
fn merge(
    inner_skip: Option<u64>,
    inner_limit: Option<u64>,
    outer_skip: Option<u64>,
    outer_limit: Option<u64>,
) -> (Option<u64>, Option<u64>) {
    let inner_skip = inner_skip.unwrap_or(0);
    let outer_skip = outer_skip.unwrap_or(0);

    let skip = inner_skip.saturating_add(outer_skip);

    // the outer skip consumes from what the inner limit exposed
    let remaining = inner_limit.map(|limit| limit.saturating_sub(outer_skip));
    let limit = match (remaining, outer_limit) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    };

    (if skip == 0 { None } else { Some(skip) }, limit)
}
