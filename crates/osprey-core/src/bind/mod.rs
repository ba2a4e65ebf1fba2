//! Module: bind
//! Responsibility: resolving input trees against the schema catalog into
//! bound IR, refusing everything outside the translatable vocabulary.
//! Does not own: IR rewriting or operator rendering.
//! Boundary: all member resolution and lambda substitution ends here; bound
//! trees carry field references and arena-indexed aggregates only.

use crate::{
    error::{CatalogError, UnsupportedQuery},
    ir::{
        aggregate_output_name, AggregationOp, Aggregator, CollectionSource, DatePart, Direction,
        FieldRef, GroupIndex, Node, PatternKind, RootAggregationKind, SortClause, StringTransform,
        Value,
    },
    schema::{Codec, NominalType, SchemaCatalog},
    tree::{CallKind, Expr, UnaryOp, VarId},
};
use bson::Bson;
use std::collections::HashMap;
use thiserror::Error as ThisError;

///
/// BindError
///
/// Binding fails either because the catalog cannot resolve a member or
/// because the tree uses a shape outside the translatable vocabulary.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub(crate) enum BindError {
    #[error(transparent)]
    Unsupported(#[from] UnsupportedQuery),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Bind an input tree into pipeline-rooted IR.
pub(crate) fn bind(catalog: &dyn SchemaCatalog, expr: &Expr) -> Result<Node, BindError> {
    Binder::new(catalog).bind_root(expr)
}

/// The element shape a lambda variable stands for at one point in a chain.
#[derive(Clone, Debug)]
enum Shape {
    Value(Value),
    Grouped { index: GroupIndex, element: Value },
}

impl Shape {
    fn value(&self) -> Result<Value, BindError> {
        match self {
            Self::Value(value) => Ok(value.clone()),
            Self::Grouped { .. } => Err(UnsupportedQuery::expression(
                "a grouping can only be consumed through its key or aggregate accessors",
            )
            .into()),
        }
    }
}

struct Binder<'a> {
    catalog: &'a dyn SchemaCatalog,
    scope: HashMap<VarId, Shape>,
    groups: u32,
}

impl<'a> Binder<'a> {
    fn new(catalog: &'a dyn SchemaCatalog) -> Self {
        Self {
            catalog,
            scope: HashMap::new(),
            groups: 0,
        }
    }

    fn bind_root(&mut self, expr: &Expr) -> Result<Node, BindError> {
        if let Expr::Call { kind, source, args } = expr {
            if kind.is_terminal() {
                return self.bind_terminal(*kind, source, args);
            }
        }
        let (node, shape) = self.bind_chain(expr)?;
        let projector = shape.value()?;
        Ok(Node::Pipeline {
            source: Box::new(node),
            projector,
            aggregator: None,
        })
    }

    // chain positions

    fn bind_chain(&mut self, expr: &Expr) -> Result<(Node, Shape), BindError> {
        match expr {
            Expr::Source(source) => Ok((
                Node::Collection(CollectionSource {
                    collection: source.collection.clone(),
                    document_type: source.document_type.clone(),
                }),
                Shape::Value(Value::Document {
                    document_type: source.document_type.clone(),
                }),
            )),
            Expr::Call { kind, source, args } => self.bind_call(*kind, source, args),
            _ => Err(UnsupportedQuery::expression(
                "queries must be a chain of operators over a collection source",
            )
            .into()),
        }
    }

    #[allow(clippy::too_many_lines)]
    fn bind_call(
        &mut self,
        kind: CallKind,
        source: &Expr,
        args: &[Expr],
    ) -> Result<(Node, Shape), BindError> {
        if kind.is_rejected() {
            return Err(UnsupportedQuery::operator(kind.name()).into());
        }
        if kind == CallKind::DistinctWithComparer {
            return Err(UnsupportedQuery::overload("distinct", "an element comparer").into());
        }
        if kind.is_terminal() {
            return Err(UnsupportedQuery::expression(format!(
                "{} must be the last operation in a chain",
                kind.name()
            ))
            .into());
        }

        let (node, shape) = self.bind_chain(source)?;
        match kind {
            CallKind::Filter => {
                let predicate = match args.first() {
                    Some(Expr::InjectedFilter(doc)) => Value::InjectedFilter(doc.clone()),
                    Some(lambda) => self.bind_lambda(lambda, &shape)?,
                    None => {
                        return Err(UnsupportedQuery::overload("filter", "no predicate").into());
                    }
                };
                Ok((Node::match_over(node, predicate), shape))
            }
            CallKind::Project => {
                let projector = self.bind_lambda(args.first().ok_or_else(missing_lambda)?, &shape)?;
                let next = Shape::Value(projector.clone());
                Ok((Node::project_over(node, projector), next))
            }
            CallKind::SortBy | CallKind::SortByDesc => {
                let value = self.bind_lambda(args.first().ok_or_else(missing_lambda)?, &shape)?;
                let clause = SortClause {
                    value,
                    direction: direction_of(kind),
                };
                Ok((Node::sort_over(node, vec![clause]), shape))
            }
            CallKind::ThenBy | CallKind::ThenByDesc => {
                let Node::Sort {
                    source,
                    mut clauses,
                } = node
                else {
                    return Err(UnsupportedQuery::expression(
                        "then_by requires an immediately preceding sort_by",
                    )
                    .into());
                };
                let value = self.bind_lambda(args.first().ok_or_else(missing_lambda)?, &shape)?;
                clauses.push(SortClause {
                    value,
                    direction: direction_of(kind),
                });
                Ok((
                    Node::Sort {
                        source,
                        clauses,
                    },
                    shape,
                ))
            }
            CallKind::GroupBy => {
                let element = shape.value().map_err(|_| {
                    BindError::from(UnsupportedQuery::expression(
                        "group_by cannot be applied to a grouping",
                    ))
                })?;
                let key = self.bind_lambda(args.first().ok_or_else(missing_lambda)?, &shape)?;
                validate_group_key(&key)?;
                let index = GroupIndex(self.groups);
                self.groups += 1;
                Ok((
                    Node::Group {
                        source: Box::new(node),
                        index,
                        key,
                        aggregations: Vec::new(),
                    },
                    Shape::Grouped { index, element },
                ))
            }
            CallKind::Skip => {
                let count = structural_count("skip", args)?;
                Ok((Node::window_over(node, Some(count), None), shape))
            }
            CallKind::Take => {
                let count = structural_count("take", args)?;
                Ok((Node::window_over(node, None, Some(count)), shape))
            }
            CallKind::Distinct => {
                let projector = shape.value()?;
                if !distinct_shaped(&projector) {
                    return Err(UnsupportedQuery::expression(
                        "distinct requires fields or records of fields",
                    )
                    .into());
                }
                // absorb the projection that produced the field; distinct
                // carries the projector itself
                let source = match node {
                    Node::Project {
                        source,
                        projector: produced,
                    } if produced == projector => *source,
                    other => other,
                };
                Ok((
                    Node::Distinct {
                        source: Box::new(source),
                        projector: projector.clone(),
                    },
                    Shape::Value(projector),
                ))
            }
            _ => Err(UnsupportedQuery::operator(kind.name()).into()),
        }
    }

    // terminals

    fn bind_terminal(
        &mut self,
        kind: CallKind,
        source: &Expr,
        args: &[Expr],
    ) -> Result<Node, BindError> {
        let (node, shape) = self.bind_chain(source)?;

        match kind {
            CallKind::Count | CallKind::CountLong => {
                let root_kind = if kind == CallKind::Count {
                    RootAggregationKind::Count
                } else {
                    RootAggregationKind::CountLong
                };
                Ok(aggregation_pipeline(node, root_kind, Value::Constant(Bson::Int32(1))))
            }
            CallKind::Sum | CallKind::Avg | CallKind::Min | CallKind::Max => {
                let argument = self.bind_lambda(args.first().ok_or_else(missing_lambda)?, &shape)?;
                let root_kind = match kind {
                    CallKind::Sum => RootAggregationKind::Sum,
                    CallKind::Avg => RootAggregationKind::Avg,
                    CallKind::Min => RootAggregationKind::Min,
                    _ => RootAggregationKind::Max,
                };
                Ok(aggregation_pipeline(node, root_kind, argument))
            }
            CallKind::First | CallKind::FirstOrNone => Ok(element_pipeline(
                Node::window_over(node, None, Some(1)),
                &shape,
                Aggregator::First {
                    or_none: kind == CallKind::FirstOrNone,
                },
            )?),
            CallKind::Single | CallKind::SingleOrNone => Ok(element_pipeline(
                Node::window_over(node, None, Some(2)),
                &shape,
                Aggregator::Single {
                    or_none: kind == CallKind::SingleOrNone,
                },
            )?),
            CallKind::Last | CallKind::LastOrNone => Ok(element_pipeline(
                node,
                &shape,
                Aggregator::Last {
                    or_none: kind == CallKind::LastOrNone,
                },
            )?),
            CallKind::Nth => {
                let index = structural_count("nth", args)?;
                Ok(element_pipeline(
                    Node::window_over(node, Some(index), Some(1)),
                    &shape,
                    Aggregator::First { or_none: false },
                )?)
            }
            CallKind::Any => {
                let node = match args.first() {
                    Some(lambda) => {
                        let predicate = self.bind_lambda(lambda, &shape)?;
                        Node::match_over(node, predicate)
                    }
                    None => node,
                };
                Ok(element_pipeline(
                    Node::window_over(node, None, Some(1)),
                    &shape,
                    Aggregator::Any,
                )?)
            }
            CallKind::All => {
                let predicate = self.bind_lambda(args.first().ok_or_else(missing_lambda)?, &shape)?;
                let negated = Value::unary(UnaryOp::Not, predicate);
                Ok(element_pipeline(
                    Node::window_over(Node::match_over(node, negated), None, Some(1)),
                    &shape,
                    Aggregator::NoneMatched,
                )?)
            }
            _ => Err(UnsupportedQuery::operator(kind.name()).into()),
        }
    }

    // value positions

    fn bind_lambda(&mut self, expr: &Expr, shape: &Shape) -> Result<Value, BindError> {
        let Expr::Lambda { var, body } = expr else {
            return Err(UnsupportedQuery::expression(
                "this operator requires a lambda argument",
            )
            .into());
        };
        self.scope.insert(*var, shape.clone());
        let bound = self.bind_value(body);
        self.scope.remove(var);
        bound
    }

    #[allow(clippy::too_many_lines)]
    fn bind_value(&mut self, expr: &Expr) -> Result<Value, BindError> {
        match expr {
            Expr::Constant(value) => Ok(Value::Constant(value.clone())),
            Expr::Parameter(slot) => Ok(Value::Parameter {
                slot: *slot,
                codec: Codec::Verbatim,
            }),
            Expr::Var(var) => match self.scope.get(var) {
                Some(shape) => shape.value(),
                None => Err(UnsupportedQuery::expression(
                    "a lambda variable escaped its defining scope",
                )
                .into()),
            },
            Expr::Member { source, name } => {
                if self.grouped_var(source).is_some() {
                    if name == "key" {
                        return Ok(Value::Field(FieldRef::synthesized("_id")));
                    }
                    return Err(UnsupportedQuery::member(name, "a grouping").into());
                }
                let bound = self.bind_value(source)?;
                self.resolve_member(bound, name)
            }
            Expr::Call { kind, source, args } => self.bind_value_call(*kind, source, args),
            Expr::Binary { op, left, right } => {
                let mut left = self.bind_value(left)?;
                let mut right = self.bind_value(right)?;
                if op.is_comparison() {
                    apply_comparison_codec(&mut left, &mut right)?;
                }
                Ok(Value::binary(*op, left, right))
            }
            Expr::Unary { op, operand } => {
                Ok(Value::unary(*op, self.bind_value(operand)?))
            }
            Expr::Conditional {
                condition,
                then,
                otherwise,
            } => Ok(Value::Conditional {
                condition: Box::new(self.bind_value(condition)?),
                then: Box::new(self.bind_value(then)?),
                otherwise: Box::new(self.bind_value(otherwise)?),
            }),
            Expr::Record(fields) => {
                let mut bound = Vec::with_capacity(fields.len());
                for (name, value) in fields {
                    bound.push((name.clone(), self.bind_value(value)?));
                }
                Ok(Value::Record(bound))
            }
            Expr::Sequence(items) => {
                let mut bound = Vec::with_capacity(items.len());
                for item in items {
                    bound.push(self.bind_value(item)?);
                }
                Ok(Value::Array(bound))
            }
            Expr::InjectedFilter(doc) => Ok(Value::InjectedFilter(doc.clone())),
            Expr::Lambda { .. } => {
                Err(UnsupportedQuery::expression("a lambda is not a value").into())
            }
            Expr::Source(_) => {
                Err(UnsupportedQuery::expression("nested queries are not supported").into())
            }
        }
    }

    fn bind_value_call(
        &mut self,
        kind: CallKind,
        source: &Expr,
        args: &[Expr],
    ) -> Result<Value, BindError> {
        // aggregate accessors bind against the grouping the variable stands
        // for; everything else binds against plain values
        if let Some((index, element)) = self.grouped_var(source) {
            return self.bind_group_aggregate(kind, index, element, args);
        }

        match kind {
            CallKind::ToLower | CallKind::ToUpper => {
                let source = self.bind_string_source(source, kind)?;
                Ok(Value::StringTransform {
                    op: if kind == CallKind::ToLower {
                        StringTransform::Lower
                    } else {
                        StringTransform::Upper
                    },
                    source: Box::new(source),
                })
            }
            CallKind::Substr => {
                let target = self.bind_string_source(source, kind)?;
                let start = structural_int("substr", args.first())?;
                let len = structural_int("substr", args.get(1))?;
                Ok(Value::Substring {
                    source: Box::new(target),
                    start,
                    len,
                })
            }
            CallKind::StartsWith | CallKind::EndsWith | CallKind::ContainsStr => {
                let target = self.bind_string_source(source, kind)?;
                let Some(Bson::String(fragment)) = args.first().and_then(Expr::as_constant)
                else {
                    return Err(UnsupportedQuery::overload(
                        kind.name(),
                        "a non-constant pattern",
                    )
                    .into());
                };
                let case_insensitive = matches!(
                    args.get(1).and_then(Expr::as_constant),
                    Some(Bson::Boolean(true))
                );
                Ok(Value::Pattern {
                    kind: match kind {
                        CallKind::StartsWith => PatternKind::StartsWith,
                        CallKind::EndsWith => PatternKind::EndsWith,
                        _ => PatternKind::Contains,
                    },
                    target: Box::new(target),
                    fragment: fragment.clone(),
                    case_insensitive,
                })
            }
            CallKind::ContainsElem => {
                let target = self.bind_value(source)?;
                let mut element =
                    self.bind_value(args.first().ok_or_else(missing_lambda)?)?;
                if let Some(field) = target.as_stored_field() {
                    element = coded(element, field.codec)?;
                } else if let Some(field) = element.as_stored_field() {
                    // membership of a field in a constant list; encode the
                    // list elements instead
                    let codec = field.codec;
                    return Ok(Value::ContainsElem {
                        target: Box::new(coded_array(target, codec)?),
                        element: Box::new(element),
                    });
                }
                Ok(Value::ContainsElem {
                    target: Box::new(target),
                    element: Box::new(element),
                })
            }
            CallKind::ContainsAll => {
                let target = self.bind_value(source)?;
                let mut elements =
                    self.bind_value(args.first().ok_or_else(missing_lambda)?)?;
                if let Some(field) = target.as_stored_field() {
                    elements = coded_array(elements, field.codec)?;
                }
                Ok(Value::ContainsAll {
                    target: Box::new(target),
                    elements: Box::new(elements),
                })
            }
            CallKind::Count
            | CallKind::Sum
            | CallKind::Avg
            | CallKind::Min
            | CallKind::Max
            | CallKind::First
            | CallKind::Last
            | CallKind::Push => Err(UnsupportedQuery::expression(format!(
                "{} is only supported over a grouping",
                kind.name()
            ))
            .into()),
            _ => Err(UnsupportedQuery::expression(format!(
                "the {} operator is not supported in a value position",
                kind.name()
            ))
            .into()),
        }
    }

    fn bind_group_aggregate(
        &mut self,
        kind: CallKind,
        index: GroupIndex,
        element: Value,
        args: &[Expr],
    ) -> Result<Value, BindError> {
        let op = match kind {
            CallKind::Count => {
                return Ok(Value::Aggregation {
                    group: index,
                    op: AggregationOp::Sum,
                    argument: Box::new(Value::Constant(Bson::Int32(1))),
                });
            }
            CallKind::Sum => AggregationOp::Sum,
            CallKind::Avg => AggregationOp::Avg,
            CallKind::Min => AggregationOp::Min,
            CallKind::Max => AggregationOp::Max,
            CallKind::First => AggregationOp::First,
            CallKind::Last => AggregationOp::Last,
            CallKind::Push => AggregationOp::Push,
            other => {
                return Err(UnsupportedQuery::member(other.name(), "a grouping").into());
            }
        };
        let argument =
            self.bind_lambda(args.first().ok_or_else(missing_lambda)?, &Shape::Value(element))?;
        Ok(Value::Aggregation {
            group: index,
            op,
            argument: Box::new(argument),
        })
    }

    /// The grouping a variable reference stands for, if it is one.
    fn grouped_var(&self, expr: &Expr) -> Option<(GroupIndex, Value)> {
        let Expr::Var(var) = expr else {
            return None;
        };
        match self.scope.get(var) {
            Some(Shape::Grouped { index, element }) => Some((*index, element.clone())),
            _ => None,
        }
    }

    fn bind_string_source(&mut self, source: &Expr, kind: CallKind) -> Result<Value, BindError> {
        let bound = self.bind_value(source)?;
        let stringish = match &bound {
            Value::Constant(Bson::String(_)) | Value::StringTransform { .. } | Value::Substring { .. } => true,
            Value::Field(field) => {
                matches!(field.nominal, NominalType::Utf8 | NominalType::Any)
            }
            Value::Binary { .. } | Value::Conditional { .. } | Value::Parameter { .. } => true,
            _ => false,
        };
        if stringish {
            Ok(bound)
        } else {
            Err(UnsupportedQuery::member(kind.name(), "a non-string value").into())
        }
    }

    fn resolve_member(&mut self, source: Value, name: &str) -> Result<Value, BindError> {
        match source {
            Value::Document { document_type } => {
                let binding = self.catalog.resolve(&document_type, name)?;
                Ok(Value::Field(FieldRef::root(&binding)))
            }
            Value::Field(field) => match &field.nominal {
                NominalType::Document(document_type) => {
                    let binding = self.catalog.resolve(document_type, name)?;
                    Ok(Value::Field(field.nested(&binding)))
                }
                NominalType::Date => {
                    let part = match name {
                        "year" => DatePart::Year,
                        "month" => DatePart::Month,
                        "day" => DatePart::Day,
                        "day_of_week" => DatePart::DayOfWeek,
                        "day_of_year" => DatePart::DayOfYear,
                        "hour" => DatePart::Hour,
                        "minute" => DatePart::Minute,
                        "second" => DatePart::Second,
                        "millisecond" => DatePart::Millisecond,
                        _ => {
                            return Err(
                                UnsupportedQuery::member(name, "a date field").into()
                            );
                        }
                    };
                    Ok(Value::DatePart {
                        part,
                        source: Box::new(Value::Field(field)),
                    })
                }
                NominalType::Array(_) if name == "len" => {
                    Ok(Value::ArrayLen(Box::new(Value::Field(field))))
                }
                NominalType::Any => {
                    // untyped fields resolve members as nested paths
                    let path = field.path.join(name);
                    Ok(Value::Field(FieldRef {
                        path,
                        nominal: NominalType::Any,
                        codec: Codec::Verbatim,
                        projected: field.projected,
                    }))
                }
                other => {
                    Err(UnsupportedQuery::member(name, &format!("a {other} field")).into())
                }
            },
            Value::Record(fields) => fields
                .into_iter()
                .find(|(field_name, _)| field_name == name)
                .map(|(_, value)| value)
                .ok_or_else(|| {
                    UnsupportedQuery::member(name, "the projected record").into()
                }),
            _ => Err(UnsupportedQuery::member(name, "a computed value").into()),
        }
    }
}

// helpers

fn missing_lambda() -> BindError {
    UnsupportedQuery::expression("this operator requires a lambda argument").into()
}

const fn direction_of(kind: CallKind) -> Direction {
    match kind {
        CallKind::SortBy | CallKind::ThenBy => Direction::Asc,
        _ => Direction::Desc,
    }
}

fn structural_count(name: &str, args: &[Expr]) -> Result<u64, BindError> {
    let count = match args.first().and_then(Expr::as_constant) {
        Some(Bson::Int32(n)) => u64::try_from(*n).ok(),
        Some(Bson::Int64(n)) => u64::try_from(*n).ok(),
        _ => None,
    };
    count.ok_or_else(|| {
        UnsupportedQuery::expression(format!("{name} requires a non-negative constant count"))
            .into()
    })
}

fn structural_int(name: &str, arg: Option<&Expr>) -> Result<i64, BindError> {
    match arg.and_then(Expr::as_constant) {
        Some(Bson::Int32(n)) => Ok(i64::from(*n)),
        Some(Bson::Int64(n)) => Ok(*n),
        _ => Err(UnsupportedQuery::expression(format!(
            "{name} requires constant positions"
        ))
        .into()),
    }
}

/// Route a comparison constant or parameter through the codec of the field
/// on the other side.
fn apply_comparison_codec(left: &mut Value, right: &mut Value) -> Result<(), BindError> {
    if let Some(field) = left.as_stored_field() {
        let codec = field.codec;
        *right = coded(std::mem::replace(right, Value::Constant(Bson::Null)), codec)?;
    } else if let Some(field) = right.as_stored_field() {
        let codec = field.codec;
        *left = coded(std::mem::replace(left, Value::Constant(Bson::Null)), codec)?;
    }
    Ok(())
}

fn coded(value: Value, codec: Codec) -> Result<Value, BindError> {
    match value {
        Value::Constant(constant) => Ok(Value::Constant(
            codec.encode(constant).map_err(BindError::Unsupported)?,
        )),
        Value::Parameter { slot, .. } => Ok(Value::Parameter { slot, codec }),
        other => Ok(other),
    }
}

fn coded_array(value: Value, codec: Codec) -> Result<Value, BindError> {
    match value {
        Value::Constant(Bson::Array(items)) => {
            let mut encoded = Vec::with_capacity(items.len());
            for item in items {
                encoded.push(codec.encode(item).map_err(BindError::Unsupported)?);
            }
            Ok(Value::Constant(Bson::Array(encoded)))
        }
        Value::Array(items) => {
            let mut encoded = Vec::with_capacity(items.len());
            for item in items {
                encoded.push(coded(item, codec)?);
            }
            Ok(Value::Array(encoded))
        }
        Value::Parameter { slot, .. } => Ok(Value::Parameter { slot, codec }),
        other => Ok(other),
    }
}

/// A distinct key is a field or a record of fields. The find form narrows
/// this further to a single stored field when the chain is lowered.
fn distinct_shaped(value: &Value) -> bool {
    match value {
        Value::Field(_) => true,
        Value::Record(fields) => fields.iter().all(|(_, value)| distinct_shaped(value)),
        _ => false,
    }
}

fn validate_group_key(key: &Value) -> Result<(), BindError> {
    fn field_shaped(value: &Value) -> bool {
        match value {
            Value::Field(_) => true,
            Value::Record(fields) => fields.iter().all(|(_, value)| field_shaped(value)),
            _ => false,
        }
    }

    match key {
        Value::Document { .. } => Err(UnsupportedQuery::expression(
            "group_by over the whole document is not supported",
        )
        .into()),
        _ if field_shaped(key) => Ok(()),
        _ => Err(UnsupportedQuery::expression(
            "group_by keys must be fields or records of fields",
        )
        .into()),
    }
}

fn aggregation_pipeline(source: Node, kind: RootAggregationKind, argument: Value) -> Node {
    Node::Pipeline {
        source: Box::new(Node::RootAggregation {
            source: Box::new(source),
            kind,
            argument,
        }),
        projector: Value::Field(FieldRef::synthesized(aggregate_output_name(0))),
        aggregator: None,
    }
}

fn element_pipeline(
    source: Node,
    shape: &Shape,
    aggregator: Aggregator,
) -> Result<Node, BindError> {
    Ok(Node::Pipeline {
        source: Box::new(source),
        projector: shape.value()?,
        aggregator: Some(aggregator),
    })
}
