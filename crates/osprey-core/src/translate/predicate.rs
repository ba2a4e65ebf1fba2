//! Module: translate::predicate
//! Responsibility: rendering bound predicates as query filter documents.
//! Does not own: aggregation expressions; those follow the operator grammar
//! in `translate::value`.
//! Boundary: negation is resolved symbolically here, so a rendered filter
//! never contains a `$not` wrapper around anything but a regex, `$size`
//! or `$all`.

use crate::{
    cache::param,
    error::UnsupportedQuery,
    ir::{BinaryOp, FieldRef, PatternKind, StringTransform, UnaryOp, Value},
    schema::NominalType,
};
use bson::{Bson, Document, Regex};

/// Render a bound predicate as a filter document.
pub(crate) fn filter(value: &Value) -> Result<Document, UnsupportedQuery> {
    match value {
        Value::Binary {
            op: BinaryOp::And,
            ..
        } => {
            let mut rendered = Vec::new();
            for conjunct in conjuncts(value) {
                rendered.push(filter(conjunct)?);
            }
            Ok(conjoin(rendered))
        }
        Value::Binary {
            op: BinaryOp::Or, ..
        } => {
            let mut rendered = Vec::new();
            for disjunct in disjuncts(value) {
                rendered.push(Bson::Document(filter(disjunct)?));
            }
            Ok(single("$or", Bson::Array(rendered)))
        }
        Value::Binary { op, left, right } if op.is_comparison() => {
            comparison(*op, left, right, false)
        }
        Value::Unary {
            op: UnaryOp::Not,
            operand,
        } => negated(operand),
        Value::Pattern {
            kind,
            target,
            fragment,
            case_insensitive,
        } => pattern(*kind, target, fragment, *case_insensitive, false),
        Value::ContainsElem { target, element } => membership(target, element, false),
        Value::ContainsAll { target, elements } => {
            let path = stored_path(target)?;
            Ok(nested(
                &path,
                Bson::Document(single("$all", element_list(elements)?)),
            ))
        }
        Value::Field(field) => {
            boolean_field(field)?;
            Ok(nested(&field.path, Bson::Boolean(true)))
        }
        Value::Constant(Bson::Boolean(true)) => Ok(Document::new()),
        Value::Constant(Bson::Boolean(false)) => Ok(match_none()),
        Value::InjectedFilter(doc) => Ok(doc.clone()),
        _ => Err(UnsupportedQuery::expression(
            "filters must compare stored fields with values",
        )),
    }
}

/// Render the symbolic negation of a predicate.
fn negated(value: &Value) -> Result<Document, UnsupportedQuery> {
    match value {
        Value::Binary {
            op: BinaryOp::And,
            ..
        } => {
            let mut rendered = Vec::new();
            for conjunct in conjuncts(value) {
                rendered.push(Bson::Document(negated(conjunct)?));
            }
            Ok(single("$or", Bson::Array(rendered)))
        }
        Value::Binary {
            op: BinaryOp::Or, ..
        } => {
            let mut rendered = Vec::new();
            for disjunct in disjuncts(value) {
                rendered.push(Bson::Document(filter(disjunct)?));
            }
            Ok(single("$nor", Bson::Array(rendered)))
        }
        Value::Binary { op, left, right } if op.is_comparison() => match op.negated() {
            Some(dual) => comparison(dual, left, right, true),
            None => Err(UnsupportedQuery::expression(
                "filters must compare stored fields with values",
            )),
        },
        Value::Unary {
            op: UnaryOp::Not,
            operand,
        } => filter(operand),
        Value::Pattern {
            kind,
            target,
            fragment,
            case_insensitive,
        } => pattern(*kind, target, fragment, *case_insensitive, true),
        Value::ContainsElem { target, element } => membership(target, element, true),
        Value::ContainsAll { target, elements } => {
            let path = stored_path(target)?;
            Ok(nested(
                &path,
                Bson::Document(single(
                    "$not",
                    Bson::Document(single("$all", element_list(elements)?)),
                )),
            ))
        }
        Value::Field(field) => {
            boolean_field(field)?;
            Ok(nested(&field.path, Bson::Boolean(false)))
        }
        Value::Constant(Bson::Boolean(true)) => Ok(match_none()),
        Value::Constant(Bson::Boolean(false)) => Ok(Document::new()),
        _ => Err(UnsupportedQuery::expression(
            "filters must compare stored fields with values",
        )),
    }
}

/// Comparisons orient themselves around the stored-field side and mirror
/// the operator when the field sits on the right.
fn comparison(
    op: BinaryOp,
    left: &Value,
    right: &Value,
    was_negated: bool,
) -> Result<Document, UnsupportedQuery> {
    if let Some(doc) = special_comparison(op, left, right)? {
        return Ok(doc);
    }
    if let Some(doc) = special_comparison(op.mirrored(), right, left)? {
        return Ok(doc);
    }
    let (field, operand, op) = match (left, right) {
        (Value::Field(field), other) if operand_value(other) => (field, other, op),
        (other, Value::Field(field)) if operand_value(other) => (field, other, op.mirrored()),
        (Value::Field(_), Value::Field(_)) => {
            return Err(UnsupportedQuery::expression(
                "comparisons between two fields are not supported in filters",
            ));
        }
        _ => {
            return Err(if was_negated {
                UnsupportedQuery::expression("filters must compare stored fields with values")
            } else {
                UnsupportedQuery::expression(
                    "filters must compare a stored field with a value",
                )
            });
        }
    };
    let value = operand_bson(operand);
    let rendered = match op {
        BinaryOp::Eq if plain_equality(&value) => value,
        BinaryOp::Eq => Bson::Document(single("$eq", value)),
        BinaryOp::Ne => Bson::Document(single("$ne", value)),
        BinaryOp::Lt => Bson::Document(single("$lt", value)),
        BinaryOp::Lte => Bson::Document(single("$lte", value)),
        BinaryOp::Gt => Bson::Document(single("$gt", value)),
        BinaryOp::Gte => Bson::Document(single("$gte", value)),
        _ => {
            return Err(UnsupportedQuery::expression(
                "filters must compare a stored field with a value",
            ));
        }
    };
    Ok(nested(&field.path, rendered))
}

/// Comparison shapes with their own filter grammar: array lengths become
/// `$size`, and equality against a cased transform becomes an anchored
/// case-insensitive regex.
fn special_comparison(
    op: BinaryOp,
    left: &Value,
    right: &Value,
) -> Result<Option<Document>, UnsupportedQuery> {
    if let Value::ArrayLen(source) = left {
        let path = stored_path(source)?;
        let Value::Constant(len) = right else {
            return Err(UnsupportedQuery::expression(
                "array length filters require a constant length",
            ));
        };
        return match op {
            BinaryOp::Eq => Ok(Some(nested(&path, Bson::Document(single("$size", len.clone()))))),
            BinaryOp::Ne => Ok(Some(nested(
                &path,
                Bson::Document(single(
                    "$not",
                    Bson::Document(single("$size", len.clone())),
                )),
            ))),
            _ => Err(UnsupportedQuery::expression(
                "array length filters support equality only",
            )),
        };
    }
    if let Value::StringTransform { op: transform, source } = left {
        let path = stored_path(source)?;
        let Value::Constant(Bson::String(text)) = right else {
            return Err(UnsupportedQuery::expression(
                "cased comparisons require a constant string",
            ));
        };
        if !matches_casing(*transform, text) {
            // the transformed string can never carry the other casing
            return match op {
                BinaryOp::Eq => Ok(Some(match_none())),
                BinaryOp::Ne => Ok(Some(Document::new())),
                _ => Err(UnsupportedQuery::expression(
                    "cased comparisons support equality only",
                )),
            };
        }
        let regex = anchored_regex(text, true);
        return match op {
            BinaryOp::Eq => Ok(Some(nested(&path, regex))),
            BinaryOp::Ne => Ok(Some(nested(&path, Bson::Document(single("$not", regex))))),
            _ => Err(UnsupportedQuery::expression(
                "cased comparisons support equality only",
            )),
        };
    }
    Ok(None)
}

fn pattern(
    kind: PatternKind,
    target: &Value,
    fragment: &str,
    case_insensitive: bool,
    was_negated: bool,
) -> Result<Document, UnsupportedQuery> {
    let (path, forced_ci) = match target {
        Value::Field(field) => (field.path.clone().into_string(), false),
        Value::StringTransform { op, source } => {
            let path = stored_path(source)?;
            if !matches_casing(*op, fragment) {
                return Ok(if was_negated { Document::new() } else { match_none() });
            }
            (path, true)
        }
        _ => {
            return Err(UnsupportedQuery::expression(
                "string patterns require a stored field",
            ));
        }
    };
    let mut source = String::new();
    if matches!(kind, PatternKind::StartsWith) {
        source.push('^');
    }
    source.push_str(&escape_regex(fragment));
    if matches!(kind, PatternKind::EndsWith) {
        source.push('$');
    }
    let options = if case_insensitive || forced_ci { "i" } else { "" };
    let regex = Bson::RegularExpression(Regex {
        pattern: source,
        options: options.to_string(),
    });
    if was_negated {
        Ok(nested(&path, Bson::Document(single("$not", regex))))
    } else {
        Ok(nested(&path, regex))
    }
}

fn membership(
    target: &Value,
    element: &Value,
    was_negated: bool,
) -> Result<Document, UnsupportedQuery> {
    // field-typed target: does the stored array contain this value
    if let Value::Field(field) = target {
        if !operand_value(element) {
            return Err(UnsupportedQuery::expression(
                "membership tests require a constant element or list",
            ));
        }
        let value = operand_bson(element);
        let rendered = if was_negated {
            Bson::Document(single("$ne", value))
        } else if plain_equality(&value) {
            value
        } else {
            Bson::Document(single("$eq", value))
        };
        return Ok(nested(&field.path, rendered));
    }
    // list-typed target: is the stored field one of these values
    if let Value::Field(field) = element {
        let list = element_list(target)?;
        let name = if was_negated { "$nin" } else { "$in" };
        return Ok(nested(&field.path, Bson::Document(single(name, list))));
    }
    Err(UnsupportedQuery::expression(
        "membership tests require a stored field on one side",
    ))
}

fn element_list(value: &Value) -> Result<Bson, UnsupportedQuery> {
    match value {
        Value::Constant(Bson::Array(items)) => Ok(Bson::Array(items.clone())),
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                if !operand_value(item) {
                    return Err(UnsupportedQuery::expression(
                        "membership lists must hold constant values",
                    ));
                }
                out.push(operand_bson(item));
            }
            Ok(Bson::Array(out))
        }
        Value::Parameter { slot, codec } => {
            Ok(Bson::Document(param::marker(*slot, *codec)))
        }
        _ => Err(UnsupportedQuery::expression(
            "membership lists must hold constant values",
        )),
    }
}

/// Merge conjunct documents key by key; a key collision falls back to an
/// explicit `$and` so neither side is overwritten.
fn conjoin(mut docs: Vec<Document>) -> Document {
    docs.retain(|doc| !doc.is_empty());
    if docs.len() == 1 {
        return docs.remove(0);
    }
    let mut merged = Document::new();
    for doc in &docs {
        for (key, value) in doc {
            if merged.contains_key(key.as_str()) {
                return single(
                    "$and",
                    Bson::Array(docs.into_iter().map(Bson::Document).collect()),
                );
            }
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}

fn conjuncts(value: &Value) -> Vec<&Value> {
    let mut out = Vec::new();
    collect(value, BinaryOp::And, &mut out);
    out
}

fn disjuncts(value: &Value) -> Vec<&Value> {
    let mut out = Vec::new();
    collect(value, BinaryOp::Or, &mut out);
    out
}

fn collect<'v>(value: &'v Value, connective: BinaryOp, out: &mut Vec<&'v Value>) {
    match value {
        Value::Binary { op, left, right } if *op == connective => {
            collect(left, connective, out);
            collect(right, connective, out);
        }
        other => out.push(other),
    }
}

/// A filter that matches no document.
fn match_none() -> Document {
    single("$nor", Bson::Array(vec![Bson::Document(Document::new())]))
}

const fn operand_value(value: &Value) -> bool {
    matches!(value, Value::Constant(_) | Value::Parameter { .. })
}

fn operand_bson(value: &Value) -> Bson {
    match value {
        Value::Constant(constant) => constant.clone(),
        Value::Parameter { slot, codec } => Bson::Document(param::marker(*slot, *codec)),
        _ => Bson::Null,
    }
}

/// Equality renders `{field: value}` directly unless the value could be
/// misread as an operator document. Parameters always take the wrapped
/// form so the filter's shape does not depend on the parameter's value.
fn plain_equality(value: &Bson) -> bool {
    match value {
        Bson::Document(doc) => !doc.keys().any(|key| key.starts_with('$')),
        _ => true,
    }
}

fn stored_path(value: &Value) -> Result<String, UnsupportedQuery> {
    match value {
        Value::Field(field) => Ok(field.path.clone().into_string()),
        _ => Err(UnsupportedQuery::expression(
            "filters must compare stored fields with values",
        )),
    }
}

fn boolean_field(field: &FieldRef) -> Result<(), UnsupportedQuery> {
    if field.nominal.is_bool() || matches!(field.nominal, NominalType::Any) {
        Ok(())
    } else {
        Err(UnsupportedQuery::expression(
            "only boolean fields can stand alone in a filter",
        ))
    }
}

fn matches_casing(transform: StringTransform, text: &str) -> bool {
    match transform {
        StringTransform::Lower => !text.chars().any(char::is_uppercase),
        StringTransform::Upper => !text.chars().any(char::is_lowercase),
    }
}

/// A regex matching the whole string, nothing less.
fn anchored_regex(text: &str, case_insensitive: bool) -> Bson {
    let mut source = String::with_capacity(text.len() + 2);
    source.push('^');
    source.push_str(&escape_regex(text));
    source.push('$');
    Bson::RegularExpression(Regex {
        pattern: source,
        options: if case_insensitive { "i" } else { "" }.to_string(),
    })
}

fn escape_regex(fragment: &str) -> String {
    let mut out = String::with_capacity(fragment.len());
    for c in fragment.chars() {
        if matches!(
            c,
            '.' | '^' | '$' | '*' | '+' | '?' | '(' | ')' | '[' | ']' | '{' | '}' | '|' | '\\'
        ) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn nested(path: &str, value: Bson) -> Document {
    let mut doc = Document::new();
    doc.insert(path, value);
    doc
}

fn single(key: &str, value: Bson) -> Document {
    let mut doc = Document::new();
    doc.insert(key, value);
    doc
}
