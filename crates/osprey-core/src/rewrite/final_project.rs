//! Drops a trailing identity projection. A projection that selects the whole
//! document adds nothing once every other pass has run; removing it keeps
//! the find form on the simple no-projection path.

use crate::ir::{Node, Value};

pub(super) fn apply(node: Node) -> (Node, bool) {
    match node {
        Node::Pipeline {
            source,
            projector,
            aggregator,
        } => match *source {
            Node::Project {
                source: inner,
                projector: Value::Document { .. },
            } => (
                Node::Pipeline {
                    source: inner,
                    projector,
                    aggregator,
                },
                true,
            ),
            other => (
                Node::Pipeline {
                    source: Box::new(other),
                    projector,
                    aggregator,
                },
                false,
            ),
        },
        // the pipeline wrapper is always outermost; nothing to do elsewhere
        other => (other, false),
    }
}
