//! Module: tree
//! Responsibility: the input expression vocabulary queries are written in.
//! Does not own: member resolution, operator rendering, or execution.
//! Boundary: everything downstream consumes `Expr` by reference; only the
//! builder and the folding pass construct or rewrite trees.

mod build;
mod fold;

pub use build::{cond, lit, record, seq, Operand, Queryable};
pub use fold::fold;

use bson::{Bson, Document};
use std::sync::atomic::{AtomicU32, Ordering};

///
/// VarId
///
/// Identity of one lambda variable. Ids are process-unique so nested lambdas
/// never shadow each other; structural hashing normalizes them away.
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct VarId(u32);

static NEXT_VAR: AtomicU32 = AtomicU32::new(0);

impl VarId {
    #[must_use]
    pub fn fresh() -> Self {
        Self(NEXT_VAR.fetch_add(1, Ordering::Relaxed))
    }
}

///
/// SourceRef
///
/// Root of every query chain: a named collection and the document type its
/// elements are resolved against.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SourceRef {
    pub collection: String,
    pub document_type: String,
}

///
/// Expr
///
/// Untyped input tree. Shapes outside this vocabulary cannot be constructed;
/// shapes inside it that the backend cannot express are refused during
/// binding or translation, never silently dropped.
///

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Source(SourceRef),
    Constant(Bson),
    /// Slot reference produced by parameterization; never user-constructed.
    Parameter(u32),
    Var(VarId),
    Member {
        source: Box<Expr>,
        name: String,
    },
    Call {
        kind: CallKind,
        source: Box<Expr>,
        args: Vec<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Conditional {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Record(Vec<(String, Expr)>),
    Sequence(Vec<Expr>),
    Lambda {
        var: VarId,
        body: Box<Expr>,
    },
    /// Pre-rendered filter document merged verbatim into the translation.
    InjectedFilter(Document),
}

///
/// BinaryOp
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    And,
    Or,
    Coalesce,
}

impl BinaryOp {
    #[must_use]
    pub const fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Eq | Self::Ne | Self::Lt | Self::Lte | Self::Gt | Self::Gte
        )
    }

    #[must_use]
    pub const fn is_arithmetic(self) -> bool {
        matches!(
            self,
            Self::Add | Self::Subtract | Self::Multiply | Self::Divide | Self::Modulo
        )
    }

    /// The comparison that holds when the operands swap sides.
    #[must_use]
    pub const fn mirrored(self) -> Self {
        match self {
            Self::Lt => Self::Gt,
            Self::Lte => Self::Gte,
            Self::Gt => Self::Lt,
            Self::Gte => Self::Lte,
            other => other,
        }
    }

    /// The comparison equivalent to negating this one, if there is one.
    #[must_use]
    pub const fn negated(self) -> Option<Self> {
        match self {
            Self::Eq => Some(Self::Ne),
            Self::Ne => Some(Self::Eq),
            Self::Lt => Some(Self::Gte),
            Self::Lte => Some(Self::Gt),
            Self::Gt => Some(Self::Lte),
            Self::Gte => Some(Self::Lt),
            _ => None,
        }
    }
}

///
/// UnaryOp
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UnaryOp {
    Not,
    Negate,
}

///
/// CallKind
///
/// Closed set of recognized call shapes. `name` is the diagnostic spelling;
/// refusals always cite it so a caller can see exactly which operator was
/// rejected.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CallKind {
    // sequence shaping
    Filter,
    Project,
    SortBy,
    SortByDesc,
    ThenBy,
    ThenByDesc,
    GroupBy,
    Skip,
    Take,
    Distinct,
    DistinctWithComparer,

    // terminals
    Count,
    CountLong,
    Sum,
    Avg,
    Min,
    Max,
    First,
    FirstOrNone,
    Single,
    SingleOrNone,
    Last,
    LastOrNone,
    Nth,
    Any,
    All,

    // group-element accumulation
    Push,

    // strings
    ToLower,
    ToUpper,
    Substr,
    StartsWith,
    EndsWith,
    ContainsStr,

    // arrays and membership
    ContainsElem,
    ContainsAll,

    // recognized so they can be refused by name
    Join,
    GroupJoin,
    Union,
    Except,
    FlatMap,
    Reverse,
    Cast,
    SequenceEq,
    FilterIndexed,
    ProjectIndexed,
}

impl CallKind {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Filter => "filter",
            Self::Project => "project",
            Self::SortBy => "sort_by",
            Self::SortByDesc => "sort_by_desc",
            Self::ThenBy => "then_by",
            Self::ThenByDesc => "then_by_desc",
            Self::GroupBy => "group_by",
            Self::Skip => "skip",
            Self::Take => "take",
            Self::Distinct | Self::DistinctWithComparer => "distinct",
            Self::Count => "count",
            Self::CountLong => "count_long",
            Self::Sum => "sum",
            Self::Avg => "avg",
            Self::Min => "min",
            Self::Max => "max",
            Self::First => "first",
            Self::FirstOrNone => "first_or_none",
            Self::Single => "single",
            Self::SingleOrNone => "single_or_none",
            Self::Last => "last",
            Self::LastOrNone => "last_or_none",
            Self::Nth => "nth",
            Self::Any => "any",
            Self::All => "all",
            Self::Push => "push",
            Self::ToLower => "to_lower",
            Self::ToUpper => "to_upper",
            Self::Substr => "substr",
            Self::StartsWith => "starts_with",
            Self::EndsWith => "ends_with",
            Self::ContainsStr => "contains_str",
            Self::ContainsElem => "contains_elem",
            Self::ContainsAll => "contains_all",
            Self::Join => "join",
            Self::GroupJoin => "group_join",
            Self::Union => "union",
            Self::Except => "except",
            Self::FlatMap => "flat_map",
            Self::Reverse => "reverse",
            Self::Cast => "cast",
            Self::SequenceEq => "sequence_eq",
            Self::FilterIndexed => "filter_indexed",
            Self::ProjectIndexed => "project_indexed",
        }
    }

    /// Operators that are recognized only to be refused.
    #[must_use]
    pub const fn is_rejected(self) -> bool {
        matches!(
            self,
            Self::Join
                | Self::GroupJoin
                | Self::Union
                | Self::Except
                | Self::FlatMap
                | Self::Reverse
                | Self::Cast
                | Self::SequenceEq
                | Self::FilterIndexed
                | Self::ProjectIndexed
        )
    }

    /// Operators that terminate a chain with a scalar or single element.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Count
                | Self::CountLong
                | Self::Sum
                | Self::Avg
                | Self::Min
                | Self::Max
                | Self::First
                | Self::FirstOrNone
                | Self::Single
                | Self::SingleOrNone
                | Self::Last
                | Self::LastOrNone
                | Self::Nth
                | Self::Any
                | Self::All
        )
    }

    /// Operators whose lambda argument is a boolean predicate.
    #[must_use]
    pub const fn is_predicated(self) -> bool {
        matches!(self, Self::Filter | Self::Any | Self::All)
    }
}

impl Expr {
    #[must_use]
    pub fn constant(value: impl Into<Bson>) -> Self {
        Self::Constant(value.into())
    }

    #[must_use]
    pub fn member(source: Self, name: impl Into<String>) -> Self {
        Self::Member {
            source: Box::new(source),
            name: name.into(),
        }
    }

    #[must_use]
    pub fn call(kind: CallKind, source: Self, args: Vec<Self>) -> Self {
        Self::Call {
            kind,
            source: Box::new(source),
            args,
        }
    }

    #[must_use]
    pub fn binary(op: BinaryOp, left: Self, right: Self) -> Self {
        Self::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    #[must_use]
    pub fn unary(op: UnaryOp, operand: Self) -> Self {
        Self::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    #[must_use]
    pub fn lambda(var: VarId, body: Self) -> Self {
        Self::Lambda {
            var,
            body: Box::new(body),
        }
    }

    /// The constant payload, if this node is one.
    #[must_use]
    pub const fn as_constant(&self) -> Option<&Bson> {
        match self {
            Self::Constant(value) => Some(value),
            _ => None,
        }
    }
}
