//! Merges adjacent filters into one conjunction, keeping the inner filter
//! first so rendered documents are deterministic.

use crate::{
    ir::{Node, Value},
    rewrite::descend,
    tree::BinaryOp,
};

pub(super) fn apply(node: Node) -> (Node, bool) {
    let (node, changed) = descend(node, apply);

    match node {
        Node::Match {
            source,
            predicate: outer,
        } => match *source {
            Node::Match {
                source: inner_source,
                predicate: inner,
            } => (
                Node::Match {
                    source: inner_source,
                    predicate: Value::binary(BinaryOp::And, inner, outer),
                },
                true,
            ),
            other => (
                Node::Match {
                    source: Box::new(other),
                    predicate: outer,
                },
                changed,
            ),
        },
        other => (other, changed),
    }
}
