//! Merges adjacent sorts into one node. The outer sort is the one the caller
//! asked for last, so its clauses lead and win ties; inner clauses survive
//! only as subordinate keys, and an inner clause over a key the outer sort
//! already orders is dropped outright.

use crate::{ir::Node, rewrite::descend};

pub(super) fn apply(node: Node) -> (Node, bool) {
    let (node, changed) = descend(node, apply);

    match node {
        Node::Sort {
            source,
            clauses: outer,
        } => match *source {
            Node::Sort {
                source: inner_source,
                clauses: inner,
            } => {
                let mut clauses = outer;
                for clause in inner {
                    let duplicate = clauses
                        .iter()
                        .any(|existing| existing.value == clause.value);
                    if !duplicate {
                        clauses.push(clause);
                    }
                }
                (
                    Node::Sort {
                        source: inner_source,
                        clauses,
                    },
                    true,
                )
            }
            other => (
                Node::Sort {
                    source: Box::new(other),
                    clauses: outer,
                },
                changed,
            ),
        },
        other => (other, changed),
    }
}
