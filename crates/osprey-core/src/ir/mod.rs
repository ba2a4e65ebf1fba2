//! Module: ir
//! Responsibility: the bound intermediate representation rewrites and
//! lowering operate on.
//! Does not own: member resolution (binder) or operator rendering
//! (translators).
//! Boundary: IR trees are fully resolved; no member names or lambda
//! variables survive past binding.

mod shape;
mod value;

pub use shape::{Aggregator, CountWidth, Projector};
pub use value::{
    DatePart, FieldPath, FieldRef, PatternKind, StringTransform, Value,
};

// bound values share the operator vocabulary of the input tree
pub use crate::tree::{BinaryOp, UnaryOp};

///
/// GroupIndex
///
/// Arena index of one grouping within a bound tree. Aggregations carry the
/// index of the group they were bound under; the grouped-aggregate rewrite
/// folds them back by looking the group up directly.
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct GroupIndex(pub u32);

///
/// Direction
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    /// Rendering used in sort documents.
    #[must_use]
    pub const fn order(self) -> i32 {
        match self {
            Self::Asc => 1,
            Self::Desc => -1,
        }
    }
}

///
/// SortClause
///
/// One ordering key. Clauses render left-to-right in sort documents, most
/// significant first.
///

#[derive(Clone, Debug, PartialEq)]
pub struct SortClause {
    pub value: Value,
    pub direction: Direction,
}

///
/// AggregationOp
///
/// Accumulators a grouping can compute server-side.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AggregationOp {
    Sum,
    Avg,
    Min,
    Max,
    First,
    Last,
    Push,
}

impl AggregationOp {
    #[must_use]
    pub const fn operator(self) -> &'static str {
        match self {
            Self::Sum => "$sum",
            Self::Avg => "$avg",
            Self::Min => "$min",
            Self::Max => "$max",
            Self::First => "$first",
            Self::Last => "$last",
            Self::Push => "$push",
        }
    }
}

///
/// Aggregation
///
/// One accumulator slot in a group's aggregation list. Slot order is the
/// order use-sites were folded in; output names are synthesized from it.
///

#[derive(Clone, Debug, PartialEq)]
pub struct Aggregation {
    pub op: AggregationOp,
    pub argument: Value,
}

/// Synthesized output name of an aggregation slot.
#[must_use]
pub fn aggregate_output_name(slot: usize) -> String {
    format!("_agg{slot}")
}

///
/// RootAggregationKind
///
/// Whole-sequence aggregates that collapse a chain to one scalar.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RootAggregationKind {
    Count,
    CountLong,
    Sum,
    Avg,
    Min,
    Max,
}

impl RootAggregationKind {
    #[must_use]
    pub const fn operator(self) -> &'static str {
        match self {
            Self::Count | Self::CountLong | Self::Sum => "$sum",
            Self::Avg => "$avg",
            Self::Min => "$min",
            Self::Max => "$max",
        }
    }

    #[must_use]
    pub const fn is_count(self) -> bool {
        matches!(self, Self::Count | Self::CountLong)
    }
}

///
/// CollectionSource
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CollectionSource {
    pub collection: String,
    pub document_type: String,
}

///
/// Node
///
/// Pipeline-shaped IR. Nesting order is application order: the innermost
/// node runs first. `Pipeline` is always the outermost node and carries the
/// client-side completion of the query.
///

#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    Collection(CollectionSource),
    Match {
        source: Box<Node>,
        predicate: Value,
    },
    Project {
        source: Box<Node>,
        projector: Value,
    },
    Group {
        source: Box<Node>,
        index: GroupIndex,
        key: Value,
        aggregations: Vec<Aggregation>,
    },
    Distinct {
        source: Box<Node>,
        projector: Value,
    },
    Sort {
        source: Box<Node>,
        clauses: Vec<SortClause>,
    },
    SkipLimit {
        source: Box<Node>,
        skip: Option<u64>,
        limit: Option<u64>,
    },
    RootAggregation {
        source: Box<Node>,
        kind: RootAggregationKind,
        argument: Value,
    },
    Pipeline {
        source: Box<Node>,
        projector: Value,
        aggregator: Option<Aggregator>,
    },
}

impl Node {
    #[must_use]
    pub fn match_over(source: Self, predicate: Value) -> Self {
        Self::Match {
            source: Box::new(source),
            predicate,
        }
    }

    #[must_use]
    pub fn project_over(source: Self, projector: Value) -> Self {
        Self::Project {
            source: Box::new(source),
            projector,
        }
    }

    #[must_use]
    pub fn sort_over(source: Self, clauses: Vec<SortClause>) -> Self {
        Self::Sort {
            source: Box::new(source),
            clauses,
        }
    }

    #[must_use]
    pub fn window_over(source: Self, skip: Option<u64>, limit: Option<u64>) -> Self {
        Self::SkipLimit {
            source: Box::new(source),
            skip,
            limit,
        }
    }

    /// The node this one applies to, if it has one.
    #[must_use]
    pub fn source(&self) -> Option<&Self> {
        match self {
            Self::Collection(_) => None,
            Self::Match { source, .. }
            | Self::Project { source, .. }
            | Self::Group { source, .. }
            | Self::Distinct { source, .. }
            | Self::Sort { source, .. }
            | Self::SkipLimit { source, .. }
            | Self::RootAggregation { source, .. }
            | Self::Pipeline { source, .. } => Some(source),
        }
    }
}
