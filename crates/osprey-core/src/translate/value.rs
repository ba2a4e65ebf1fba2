//! Module: translate::value
//! Responsibility: rendering bound values as aggregation expressions.
//! Does not own: filter documents; those follow the query-document grammar
//! in `translate::predicate`.
//! Boundary: values that only make sense as filters (patterns, membership,
//! injected documents) are refused here rather than guessed at.

use crate::{
    cache::param,
    error::UnsupportedQuery,
    ir::{BinaryOp, UnaryOp, Value},
};
use bson::{Bson, Document};

/// Render a bound value as an aggregation expression.
///
/// Rendering is deterministic: the same value always produces the same
/// document, key order included.
pub(crate) fn expression(value: &Value) -> Result<Bson, UnsupportedQuery> {
    match value {
        Value::Constant(constant) => Ok(literal(constant)),
        Value::Parameter { slot, codec } => Ok(Bson::Document(param::marker(*slot, *codec))),
        Value::Field(field) => Ok(Bson::String(format!("${}", field.path))),
        Value::Binary { op, left, right } => binary(*op, left, right),
        Value::Unary { op, operand } => match op {
            UnaryOp::Not => Ok(operator("$not", vec![expression(operand)?])),
            UnaryOp::Negate => Ok(operator(
                "$subtract",
                vec![Bson::Int32(0), expression(operand)?],
            )),
        },
        Value::Conditional {
            condition,
            then,
            otherwise,
        } => Ok(operator(
            "$cond",
            vec![
                expression(condition)?,
                expression(then)?,
                expression(otherwise)?,
            ],
        )),
        Value::Record(fields) => {
            let mut doc = Document::new();
            for (name, field) in fields {
                doc.insert(name.clone(), expression(field)?);
            }
            Ok(Bson::Document(doc))
        }
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(expression(item)?);
            }
            Ok(Bson::Array(out))
        }
        Value::StringTransform { op, source } => {
            Ok(operator_unary(op.operator(), expression(source)?))
        }
        Value::Substring { source, start, len } => Ok(operator(
            "$substr",
            vec![
                expression(source)?,
                Bson::Int64(*start),
                Bson::Int64(*len),
            ],
        )),
        Value::DatePart { part, source } => {
            Ok(operator_unary(part.operator(), expression(source)?))
        }
        Value::ArrayLen(source) => Ok(operator_unary("$size", expression(source)?)),
        Value::Pattern { .. } => Err(UnsupportedQuery::expression(
            "string patterns are only supported as filters",
        )),
        Value::ContainsElem { .. } | Value::ContainsAll { .. } => Err(
            UnsupportedQuery::expression("membership tests are only supported as filters"),
        ),
        Value::InjectedFilter(_) => Err(UnsupportedQuery::expression(
            "an injected filter document is not a value",
        )),
        Value::Document { .. } => Err(UnsupportedQuery::expression(
            "a whole document cannot be rendered as a value",
        )),
        Value::Aggregation { .. } | Value::GroupedAggregate { .. } => {
            Err(UnsupportedQuery::expression(
                "could not associate an aggregate with its grouping",
            ))
        }
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Bson, UnsupportedQuery> {
    let l = expression(left)?;
    let r = expression(right)?;
    let name = match op {
        BinaryOp::Add => {
            if stringish(left) || stringish(right) {
                return Ok(flattened("$concat", l, r));
            }
            return Ok(flattened("$add", l, r));
        }
        BinaryOp::Multiply => return Ok(flattened("$multiply", l, r)),
        BinaryOp::And => return Ok(flattened("$and", l, r)),
        BinaryOp::Or => return Ok(flattened("$or", l, r)),
        BinaryOp::Subtract => "$subtract",
        BinaryOp::Divide => "$divide",
        BinaryOp::Modulo => "$mod",
        BinaryOp::Eq => "$eq",
        BinaryOp::Ne => "$ne",
        BinaryOp::Lt => "$lt",
        BinaryOp::Lte => "$lte",
        BinaryOp::Gt => "$gt",
        BinaryOp::Gte => "$gte",
        BinaryOp::Coalesce => "$ifNull",
    };
    Ok(operator(name, vec![l, r]))
}

/// Constants that could be misread as operator expressions are wrapped
/// in `$literal`; everything else renders verbatim.
fn literal(constant: &Bson) -> Bson {
    match constant {
        Bson::String(s) if s.starts_with('$') => {
            Bson::Document(operator_doc("$literal", constant.clone()))
        }
        Bson::Document(_) => Bson::Document(operator_doc("$literal", constant.clone())),
        other => other.clone(),
    }
}

fn operator(name: &str, operands: Vec<Bson>) -> Bson {
    Bson::Document(operator_doc(name, Bson::Array(operands)))
}

fn operator_unary(name: &str, operand: Bson) -> Bson {
    Bson::Document(operator_doc(name, operand))
}

fn operator_doc(name: &str, operand: Bson) -> Document {
    let mut doc = Document::new();
    doc.insert(name, operand);
    doc
}

/// Associative operators render n-ary: `a + b + c` becomes one
/// `{$add: [a, b, c]}` rather than a nested pair.
fn flattened(name: &str, left: Bson, right: Bson) -> Bson {
    let mut operands = flatten_operand(name, left);
    operands.extend(flatten_operand(name, right));
    operator(name, operands)
}

fn flatten_operand(name: &str, operand: Bson) -> Vec<Bson> {
    match operand {
        Bson::Document(mut doc)
            if doc.len() == 1 && matches!(doc.get(name), Some(Bson::Array(_))) =>
        {
            match doc.remove(name) {
                Some(Bson::Array(operands)) => operands,
                _ => vec![Bson::Document(doc)],
            }
        }
        other => vec![other],
    }
}

fn stringish(value: &Value) -> bool {
    match value {
        Value::Constant(Bson::String(_))
        | Value::StringTransform { .. }
        | Value::Substring { .. } => true,
        Value::Field(field) => field.nominal.is_string(),
        Value::Binary {
            op: BinaryOp::Add,
            left,
            right,
        } => stringish(left) || stringish(right),
        Value::Conditional {
            then, otherwise, ..
        } => stringish(then) || stringish(otherwise),
        Value::Binary {
            op: BinaryOp::Coalesce,
            left,
            right,
        } => stringish(left) || stringish(right),
        _ => false,
    }
}
