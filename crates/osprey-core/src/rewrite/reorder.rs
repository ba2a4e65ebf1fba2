//! Hoists filters above adjacent projections so later passes can merge them
//! and the find-form builder sees filters before shaping. A filter can only
//! move when it references no field synthesized by the projection it crosses;
//! it never crosses a grouping or a distinct because the pattern requires a
//! projection directly beneath the match.

use crate::{
    ir::Node,
    rewrite::descend,
};

pub(super) fn apply(node: Node) -> (Node, bool) {
    let (node, changed) = descend(node, apply);

    match node {
        Node::Match { source, predicate } => match *source {
            Node::Project {
                source: inner,
                projector,
            } if !predicate.references_projected_field() => (
                Node::Project {
                    source: Box::new(Node::Match {
                        source: inner,
                        predicate,
                    }),
                    projector,
                },
                true,
            ),
            other => (
                Node::Match {
                    source: Box::new(other),
                    predicate,
                },
                changed,
            ),
        },
        other => (other, changed),
    }
}
