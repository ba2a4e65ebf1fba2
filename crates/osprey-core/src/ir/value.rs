use crate::{
    ir::{AggregationOp, BinaryOp, GroupIndex, UnaryOp},
    schema::{Codec, FieldBinding, NominalType},
};
use bson::{Bson, Document};
use derive_more::Deref;
use std::fmt;

///
/// FieldPath
///
/// Dotted path of a stored field, rooted at the document.
///

#[derive(Clone, Debug, Deref, Eq, Hash, PartialEq)]
pub struct FieldPath(String);

impl FieldPath {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// Extend this path with a nested element name.
    #[must_use]
    pub fn join(&self, name: &str) -> Self {
        Self(format!("{}.{name}", self.0))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

///
/// FieldRef
///
/// Bound reference to a stored field. `projected` marks fields that only
/// exist after a shape-changing step (group keys, aggregate outputs); those
/// never participate in reordering against the source document.
///

#[derive(Clone, Debug, PartialEq)]
pub struct FieldRef {
    pub path: FieldPath,
    pub nominal: NominalType,
    pub codec: Codec,
    pub projected: bool,
}

impl FieldRef {
    #[must_use]
    pub fn root(binding: &FieldBinding) -> Self {
        Self {
            path: FieldPath::new(binding.name.clone()),
            nominal: binding.nominal.clone(),
            codec: binding.codec,
            projected: false,
        }
    }

    /// Nested field beneath this one.
    #[must_use]
    pub fn nested(&self, binding: &FieldBinding) -> Self {
        Self {
            path: self.path.join(&binding.name),
            nominal: binding.nominal.clone(),
            codec: binding.codec,
            projected: self.projected,
        }
    }

    /// Field that exists only in a reshaped result, such as a group key or
    /// a synthesized aggregate output.
    #[must_use]
    pub fn synthesized(path: impl Into<String>) -> Self {
        Self {
            path: FieldPath::new(path),
            nominal: NominalType::Any,
            codec: Codec::Verbatim,
            projected: true,
        }
    }
}

///
/// StringTransform
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StringTransform {
    Lower,
    Upper,
}

impl StringTransform {
    #[must_use]
    pub const fn operator(self) -> &'static str {
        match self {
            Self::Lower => "$toLower",
            Self::Upper => "$toUpper",
        }
    }
}

///
/// DatePart
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DatePart {
    Year,
    Month,
    Day,
    DayOfWeek,
    DayOfYear,
    Hour,
    Minute,
    Second,
    Millisecond,
}

impl DatePart {
    #[must_use]
    pub const fn operator(self) -> &'static str {
        match self {
            Self::Year => "$year",
            Self::Month => "$month",
            Self::Day => "$dayOfMonth",
            Self::DayOfWeek => "$dayOfWeek",
            Self::DayOfYear => "$dayOfYear",
            Self::Hour => "$hour",
            Self::Minute => "$minute",
            Self::Second => "$second",
            Self::Millisecond => "$millisecond",
        }
    }
}

///
/// PatternKind
///
/// Anchoring of a string-pattern predicate.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PatternKind {
    StartsWith,
    EndsWith,
    Contains,
}

///
/// Value
///
/// Bound value expression. Everything is resolved: members became field
/// references, lambda variables were substituted away, and comparison
/// constants already passed through their field codec.
///

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Constant(Bson),
    /// Lifted constant slot; the codec is applied when the slot is filled.
    Parameter {
        slot: u32,
        codec: Codec,
    },
    /// The whole current document.
    Document {
        document_type: String,
    },
    Field(FieldRef),
    Binary {
        op: BinaryOp,
        left: Box<Value>,
        right: Box<Value>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Value>,
    },
    Conditional {
        condition: Box<Value>,
        then: Box<Value>,
        otherwise: Box<Value>,
    },
    Record(Vec<(String, Value)>),
    Array(Vec<Value>),
    StringTransform {
        op: StringTransform,
        source: Box<Value>,
    },
    Substring {
        source: Box<Value>,
        start: i64,
        len: i64,
    },
    Pattern {
        kind: PatternKind,
        target: Box<Value>,
        fragment: String,
        case_insensitive: bool,
    },
    DatePart {
        part: DatePart,
        source: Box<Value>,
    },
    ArrayLen(Box<Value>),
    ContainsElem {
        target: Box<Value>,
        element: Box<Value>,
    },
    ContainsAll {
        target: Box<Value>,
        elements: Box<Value>,
    },
    /// Aggregate bound against a grouping's element sequence, not yet folded
    /// into the group's aggregation list.
    Aggregation {
        group: GroupIndex,
        op: AggregationOp,
        argument: Box<Value>,
    },
    /// Folded aggregate awaiting replacement with its synthesized output
    /// field. Only ever exists inside the grouped-aggregate rewrite.
    GroupedAggregate {
        group: GroupIndex,
        slot: usize,
    },
    /// Pre-rendered filter fragment merged verbatim.
    InjectedFilter(Document),
}

impl Value {
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
    pub const fn as_field(&self) -> Option<&FieldRef> {
        match self {
            Self::Field(field) => Some(field),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_constant(&self) -> Option<&Bson> {
        match self {
            Self::Constant(value) => Some(value),
            _ => None,
        }
    }

    /// A field reference usable as a comparison or sort target: bound
    /// directly to storage, not synthesized by a reshaping step.
    #[must_use]
    pub const fn as_stored_field(&self) -> Option<&FieldRef> {
        match self.as_field() {
            Some(field) if !field.projected => Some(field),
            _ => None,
        }
    }

    /// Whether any field reference in this expression is synthesized by a
    /// reshaping step. Such expressions cannot move below the step that
    /// synthesizes their fields.
    #[must_use]
    pub fn references_projected_field(&self) -> bool {
        let mut found = false;
        self.visit(&mut |value| {
            if let Self::Field(field) = value {
                found |= field.projected;
            }
            if matches!(
                value,
                Self::Aggregation { .. } | Self::GroupedAggregate { .. }
            ) {
                found = true;
            }
        });
        found
    }

    /// Bottom-up rebuild of this value, applying `f` to every node after its
    /// children have been rebuilt.
    pub fn try_map<E>(self, f: &mut impl FnMut(Self) -> Result<Self, E>) -> Result<Self, E> {
        let rebuilt = match self {
            Self::Binary { op, left, right } => Self::Binary {
                op,
                left: Box::new(left.try_map(f)?),
                right: Box::new(right.try_map(f)?),
            },
            Self::Unary { op, operand } => Self::Unary {
                op,
                operand: Box::new(operand.try_map(f)?),
            },
            Self::Conditional {
                condition,
                then,
                otherwise,
            } => Self::Conditional {
                condition: Box::new(condition.try_map(f)?),
                then: Box::new(then.try_map(f)?),
                otherwise: Box::new(otherwise.try_map(f)?),
            },
            Self::Record(fields) => {
                let mut rebuilt = Vec::with_capacity(fields.len());
                for (name, value) in fields {
                    rebuilt.push((name, value.try_map(f)?));
                }
                Self::Record(rebuilt)
            }
            Self::Array(items) => {
                let mut rebuilt = Vec::with_capacity(items.len());
                for item in items {
                    rebuilt.push(item.try_map(f)?);
                }
                Self::Array(rebuilt)
            }
            Self::StringTransform { op, source } => Self::StringTransform {
                op,
                source: Box::new(source.try_map(f)?),
            },
            Self::Substring { source, start, len } => Self::Substring {
                source: Box::new(source.try_map(f)?),
                start,
                len,
            },
            Self::Pattern {
                kind,
                target,
                fragment,
                case_insensitive,
            } => Self::Pattern {
                kind,
                target: Box::new(target.try_map(f)?),
                fragment,
                case_insensitive,
            },
            Self::DatePart { part, source } => Self::DatePart {
                part,
                source: Box::new(source.try_map(f)?),
            },
            Self::ArrayLen(target) => Self::ArrayLen(Box::new(target.try_map(f)?)),
            Self::ContainsElem { target, element } => Self::ContainsElem {
                target: Box::new(target.try_map(f)?),
                element: Box::new(element.try_map(f)?),
            },
            Self::ContainsAll { target, elements } => Self::ContainsAll {
                target: Box::new(target.try_map(f)?),
                elements: Box::new(elements.try_map(f)?),
            },
            Self::Aggregation {
                group,
                op,
                argument,
            } => Self::Aggregation {
                group,
                op,
                argument: Box::new(argument.try_map(f)?),
            },
            leaf => leaf,
        };
        f(rebuilt)
    }

    /// Depth-first visit of this value and every nested value.
    pub fn visit(&self, f: &mut impl FnMut(&Self)) {
        f(self);
        match self {
            Self::Binary { left, right, .. } => {
                left.visit(f);
                right.visit(f);
            }
            Self::Unary { operand, .. } => operand.visit(f),
            Self::Conditional {
                condition,
                then,
                otherwise,
            } => {
                condition.visit(f);
                then.visit(f);
                otherwise.visit(f);
            }
            Self::Record(fields) => {
                for (_, value) in fields {
                    value.visit(f);
                }
            }
            Self::Array(items) => {
                for item in items {
                    item.visit(f);
                }
            }
            Self::StringTransform { source, .. }
            | Self::Substring { source, .. }
            | Self::DatePart { source, .. } => source.visit(f),
            Self::Pattern { target, .. } | Self::ArrayLen(target) => target.visit(f),
            Self::ContainsElem { target, element } => {
                target.visit(f);
                element.visit(f);
            }
            Self::ContainsAll { target, elements } => {
                target.visit(f);
                elements.visit(f);
            }
            Self::Aggregation { argument, .. } => argument.visit(f),
            Self::Constant(_)
            | Self::Parameter { .. }
            | Self::Document { .. }
            | Self::Field(_)
            | Self::GroupedAggregate { .. }
            | Self::InjectedFilter(_) => {}
        }
    }
}
