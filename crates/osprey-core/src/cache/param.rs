//! Module: cache::param
//! Responsibility: lifting comparison constants out of input trees and
//! filling them back into cached translations.
//! Does not own: fingerprinting or cache storage.
//! Boundary: markers are private to this crate; a rendered translation with
//! unfilled markers never leaves the translator.

use crate::{
    error::UnsupportedQuery,
    schema::Codec,
    tree::{BinaryOp, CallKind, Expr},
};
use bson::{Bson, Document};

/// Marker keys for an unfilled parameter slot inside a cached translation.
const PARAM_KEY: &str = "$__param";
const CODEC_KEY: &str = "$__codec";

/// Render the marker document for one slot.
#[must_use]
pub(crate) fn marker(slot: u32, codec: Codec) -> Document {
    let mut doc = Document::new();
    doc.insert(PARAM_KEY, Bson::Int64(i64::from(slot)));
    doc.insert(CODEC_KEY, Bson::Int32(codec.tag()));
    doc
}

fn as_marker(doc: &Document) -> Option<(u32, Codec)> {
    if doc.len() != 2 {
        return None;
    }
    let Some(Bson::Int64(slot)) = doc.get(PARAM_KEY) else {
        return None;
    };
    let Some(Bson::Int32(tag)) = doc.get(CODEC_KEY) else {
        return None;
    };
    let slot = u32::try_from(*slot).ok()?;
    Some((slot, Codec::from_tag(*tag)?))
}

///
/// Parameterized
///
/// An input tree with its comparison constants replaced by ordered slots,
/// plus the lifted values in slot order.
///

#[derive(Debug)]
pub(crate) struct Parameterized {
    pub template: Expr,
    pub slots: Vec<Bson>,
}

/// Lift comparison and value constants into parameter slots.
///
/// Constants the rewrite passes compute on stay structural: window counts,
/// element indices, substring positions, pattern fragments and flags, and
/// injected filter documents all shape the translation itself, so they are
/// part of the cached shape rather than parameters of it.
#[must_use]
pub(crate) fn parameterize(expr: &Expr) -> Parameterized {
    let mut slots = Vec::new();
    let template = lift(expr, false, &mut slots);
    Parameterized { template, slots }
}

fn lift(expr: &Expr, structural: bool, slots: &mut Vec<Bson>) -> Expr {
    match expr {
        Expr::Constant(value) => {
            if structural {
                Expr::Constant(value.clone())
            } else {
                let slot = u32::try_from(slots.len()).unwrap_or(u32::MAX);
                slots.push(value.clone());
                Expr::Parameter(slot)
            }
        }
        Expr::Member { source, name } => Expr::Member {
            source: Box::new(lift(source, structural, slots)),
            name: name.clone(),
        },
        Expr::Call { kind, source, args } => {
            let arg_structural = structural_args(*kind);
            Expr::Call {
                kind: *kind,
                source: Box::new(lift(source, structural, slots)),
                args: args
                    .iter()
                    .map(|arg| {
                        // a predicate that is a bare constant decides the
                        // filter's shape, not a value inside it
                        let bare = kind.is_predicated() && is_constant_lambda(arg);
                        lift(arg, structural || arg_structural || bare, slots)
                    })
                    .collect(),
            }
        }
        Expr::Binary { op, left, right } => {
            // equality against a cased transform renders as a regex, so the
            // compared string is part of the translation's shape
            let cased = matches!(op, BinaryOp::Eq | BinaryOp::Ne)
                && (is_cased_call(left) || is_cased_call(right));
            Expr::Binary {
                op: *op,
                left: Box::new(lift(left, structural || cased, slots)),
                right: Box::new(lift(right, structural || cased, slots)),
            }
        }
        Expr::Unary { op, operand } => Expr::Unary {
            op: *op,
            operand: Box::new(lift(operand, structural, slots)),
        },
        Expr::Conditional {
            condition,
            then,
            otherwise,
        } => Expr::Conditional {
            condition: Box::new(lift(condition, structural, slots)),
            then: Box::new(lift(then, structural, slots)),
            otherwise: Box::new(lift(otherwise, structural, slots)),
        },
        Expr::Record(fields) => Expr::Record(
            fields
                .iter()
                .map(|(name, value)| (name.clone(), lift(value, structural, slots)))
                .collect(),
        ),
        Expr::Sequence(items) => Expr::Sequence(
            items
                .iter()
                .map(|item| lift(item, structural, slots))
                .collect(),
        ),
        Expr::Lambda { var, body } => Expr::Lambda {
            var: *var,
            body: Box::new(lift(body, structural, slots)),
        },
        leaf @ (Expr::Source(_) | Expr::Parameter(_) | Expr::Var(_) | Expr::InjectedFilter(_)) => {
            leaf.clone()
        }
    }
}

fn is_constant_lambda(expr: &Expr) -> bool {
    matches!(expr, Expr::Lambda { body, .. } if matches!(body.as_ref(), Expr::Constant(_)))
}

fn is_cased_call(expr: &Expr) -> bool {
    matches!(
        expr,
        Expr::Call {
            kind: CallKind::ToLower | CallKind::ToUpper,
            ..
        }
    )
}

/// Call kinds whose arguments shape the translation and therefore never
/// become parameters.
const fn structural_args(kind: CallKind) -> bool {
    matches!(
        kind,
        CallKind::Skip
            | CallKind::Take
            | CallKind::Nth
            | CallKind::Substr
            | CallKind::StartsWith
            | CallKind::EndsWith
            | CallKind::ContainsStr
    )
}

/// Fill every marker in a rendered document tree with its encoded slot
/// value. Substitution is a single pass: replacement values are inserted
/// as-is and never rescanned, so user data can never alias a marker.
pub(crate) fn fill_document(
    doc: &Document,
    slots: &[Bson],
) -> Result<Document, UnsupportedQuery> {
    let mut out = Document::new();
    for (key, value) in doc {
        out.insert(key.clone(), fill_value(value, slots)?);
    }
    Ok(out)
}

pub(crate) fn fill_value(value: &Bson, slots: &[Bson]) -> Result<Bson, UnsupportedQuery> {
    match value {
        Bson::Document(doc) => {
            if let Some((slot, codec)) = as_marker(doc) {
                let raw = slots.get(slot as usize).cloned().ok_or_else(|| {
                    UnsupportedQuery::expression(format!(
                        "translation parameter {slot} has no value"
                    ))
                })?;
                return codec.encode(raw);
            }
            Ok(Bson::Document(fill_document(doc, slots)?))
        }
        Bson::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(fill_value(item, slots)?);
            }
            Ok(Bson::Array(out))
        }
        other => Ok(other.clone()),
    }
}
