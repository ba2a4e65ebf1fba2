//! Module: rewrite
//! Responsibility: the fixed pass sequence run over bound IR before
//! lowering.
//! Does not own: binding legality or operator rendering.
//! Boundary: passes only move, merge, and fold nodes that are already
//! legal; the only failure is an aggregate that cannot be traced to its
//! grouping.

mod final_project;
mod grouped;
mod match_merge;
mod reorder;
mod sort;
mod window;

use crate::{error::UnsupportedQuery, ir::Node};

/// Run every pass in order, repeating the sequence until a full round makes
/// no change. Each pass is idempotent; the loop exists because one pass can
/// expose a pattern for an earlier one.
pub(crate) fn rewrite(mut node: Node) -> Result<Node, UnsupportedQuery> {
    loop {
        let mut changed = false;

        let (next, hit) = reorder::apply(node);
        node = next;
        changed |= hit;

        let (next, hit) = window::apply(node);
        node = next;
        changed |= hit;

        let (next, hit) = sort::apply(node);
        node = next;
        changed |= hit;

        let (next, hit) = match_merge::apply(node);
        node = next;
        changed |= hit;

        let (next, hit) = grouped::apply(node)?;
        node = next;
        changed |= hit;

        let (next, hit) = final_project::apply(node);
        node = next;
        changed |= hit;

        if !changed {
            return Ok(node);
        }
    }
}

/// Rebuild a node with `f` applied to its source, bottom-up.
fn descend<F>(node: Node, f: F) -> (Node, bool)
where
    F: FnOnce(Node) -> (Node, bool),
{
    match node {
        Node::Collection(source) => (Node::Collection(source), false),
        Node::Match { source, predicate } => {
            let (source, changed) = f(*source);
            (
                Node::Match {
                    source: Box::new(source),
                    predicate,
                },
                changed,
            )
        }
        Node::Project { source, projector } => {
            let (source, changed) = f(*source);
            (
                Node::Project {
                    source: Box::new(source),
                    projector,
                },
                changed,
            )
        }
        Node::Group {
            source,
            index,
            key,
            aggregations,
        } => {
            let (source, changed) = f(*source);
            (
                Node::Group {
                    source: Box::new(source),
                    index,
                    key,
                    aggregations,
                },
                changed,
            )
        }
        Node::Distinct { source, projector } => {
            let (source, changed) = f(*source);
            (
                Node::Distinct {
                    source: Box::new(source),
                    projector,
                },
                changed,
            )
        }
        Node::Sort { source, clauses } => {
            let (source, changed) = f(*source);
            (
                Node::Sort {
                    source: Box::new(source),
                    clauses,
                },
                changed,
            )
        }
        Node::SkipLimit {
            source,
            skip,
            limit,
        } => {
            let (source, changed) = f(*source);
            (
                Node::SkipLimit {
                    source: Box::new(source),
                    skip,
                    limit,
                },
                changed,
            )
        }
        Node::RootAggregation {
            source,
            kind,
            argument,
        } => {
            let (source, changed) = f(*source);
            (
                Node::RootAggregation {
                    source: Box::new(source),
                    kind,
                    argument,
                },
                changed,
            )
        }
        Node::Pipeline {
            source,
            projector,
            aggregator,
        } => {
            let (source, changed) = f(*source);
            (
                Node::Pipeline {
                    source: Box::new(source),
                    projector,
                    aggregator,
                },
                changed,
            )
        }
    }
}
