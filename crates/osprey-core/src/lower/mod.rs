//! Module: lower
//! Responsibility: choosing and building the executable form of a bound
//! chain.
//! Does not own: rendering grammars; both builders lean on `translate`.
//! Boundary: the find form is always preferred. A pipeline runs only when
//! the chain has no find form and the targets allow one.

mod pipeline;
mod projection;
mod query;

use crate::{
    error::{TranslateError, UnsupportedQuery},
    exec::Model,
    ir::Node,
};
use std::fmt;

///
/// ExecutionTarget
///
/// The execution forms a translation may produce.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ExecutionTarget {
    pub find: bool,
    pub pipeline: bool,
}

impl ExecutionTarget {
    pub const FIND_ONLY: Self = Self {
        find: true,
        pipeline: false,
    };

    pub const PIPELINE_ONLY: Self = Self {
        find: false,
        pipeline: true,
    };

    pub const BEST_EFFORT: Self = Self {
        find: true,
        pipeline: true,
    };
}

impl fmt::Display for ExecutionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.find, self.pipeline) {
            (true, true) => write!(f, "find or pipeline"),
            (true, false) => write!(f, "find"),
            (false, true) => write!(f, "pipeline"),
            (false, false) => write!(f, "no targets"),
        }
    }
}

/// Build the executable model of a rewritten chain.
pub(crate) fn lower(node: &Node, targets: ExecutionTarget) -> Result<Model, TranslateError> {
    if !targets.find && !targets.pipeline {
        return Err(TranslateError::unsupported(
            targets,
            UnsupportedQuery::new("no execution form is enabled"),
        ));
    }

    if targets.find {
        match query::build(node) {
            Ok(model) => return Ok(Model::Find(model)),
            Err(reason) if !targets.pipeline => {
                return Err(TranslateError::unsupported(targets, reason));
            }
            // fall through and let the pipeline builder report its own
            // reason if it refuses too
            Err(_) => {}
        }
    }

    match pipeline::build(node) {
        Ok(model) => Ok(Model::Pipeline(model)),
        Err(reason) => Err(TranslateError::unsupported(targets, reason)),
    }
}
