//! Module: tree::fold
//! Responsibility: pre-bind evaluation of constant subexpressions.
//! Does not own: member resolution or operator rendering.
//! Boundary: runs on raw input trees, before parameterization, so late-bound
//! captures are already plain constants by the time they are lifted.

use crate::tree::{BinaryOp, CallKind, Expr, UnaryOp};
use bson::Bson;
use std::cmp::Ordering;

/// Fold every constant subexpression. Folding is conservative: anything that
/// would overflow, divide by zero, or compare incomparable values is left
/// unfolded for the translator to deal with.
#[must_use]
pub fn fold(expr: Expr) -> Expr {
    match expr {
        Expr::Binary { op, left, right } => fold_binary(op, fold(*left), fold(*right)),
        Expr::Unary { op, operand } => fold_unary(op, fold(*operand)),
        Expr::Conditional {
            condition,
            then,
            otherwise,
        } => {
            let condition = fold(*condition);
            match condition.as_constant() {
                Some(Bson::Boolean(true)) => fold(*then),
                Some(Bson::Boolean(false)) => fold(*otherwise),
                _ => Expr::Conditional {
                    condition: Box::new(condition),
                    then: Box::new(fold(*then)),
                    otherwise: Box::new(fold(*otherwise)),
                },
            }
        }
        Expr::Member { source, name } => Expr::member(fold(*source), name),
        Expr::Call { kind, source, args } => fold_call(
            kind,
            fold(*source),
            args.into_iter().map(fold).collect(),
        ),
        Expr::Record(fields) => Expr::Record(
            fields
                .into_iter()
                .map(|(name, value)| (name, fold(value)))
                .collect(),
        ),
        Expr::Sequence(items) => {
            let items: Vec<Expr> = items.into_iter().map(fold).collect();
            if items.iter().all(|item| item.as_constant().is_some()) {
                let values = items
                    .into_iter()
                    .filter_map(|item| match item {
                        Expr::Constant(value) => Some(value),
                        _ => None,
                    })
                    .collect();
                Expr::Constant(Bson::Array(values))
            } else {
                Expr::Sequence(items)
            }
        }
        Expr::Lambda { var, body } => Expr::lambda(var, fold(*body)),
        leaf => leaf,
    }
}

fn fold_binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    if matches!(op, BinaryOp::And | BinaryOp::Or) {
        return fold_logical(op, left, right);
    }
    if op == BinaryOp::Coalesce {
        return match left.as_constant() {
            Some(Bson::Null) => right,
            Some(_) => left,
            None => Expr::binary(op, left, right),
        };
    }

    let folded = match (left.as_constant(), right.as_constant()) {
        (Some(lhs), Some(rhs)) => eval_binary(op, lhs, rhs),
        _ => None,
    };
    match folded {
        Some(value) => Expr::Constant(value),
        None => Expr::binary(op, left, right),
    }
}

fn fold_logical(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    let as_bool = |expr: &Expr| match expr.as_constant() {
        Some(Bson::Boolean(b)) => Some(*b),
        _ => None,
    };

    match (op, as_bool(&left), as_bool(&right)) {
        (BinaryOp::And, Some(true), _) | (BinaryOp::Or, Some(false), _) => right,
        (BinaryOp::And, None, Some(true)) | (BinaryOp::Or, None, Some(false)) => left,
        (BinaryOp::And, Some(false), _) | (BinaryOp::And, None, Some(false)) => {
            Expr::constant(false)
        }
        (BinaryOp::Or, Some(true), _) | (BinaryOp::Or, None, Some(true)) => Expr::constant(true),
        _ => Expr::binary(op, left, right),
    }
}

fn fold_unary(op: UnaryOp, operand: Expr) -> Expr {
    let folded = match (op, operand.as_constant()) {
        (UnaryOp::Not, Some(Bson::Boolean(b))) => Some(Bson::Boolean(!b)),
        (UnaryOp::Negate, Some(Bson::Int32(n))) => n.checked_neg().map(Bson::Int32),
        (UnaryOp::Negate, Some(Bson::Int64(n))) => n.checked_neg().map(Bson::Int64),
        (UnaryOp::Negate, Some(Bson::Double(n))) => Some(Bson::Double(-n)),
        _ => None,
    };
    match folded {
        Some(value) => Expr::Constant(value),
        None => Expr::unary(op, operand),
    }
}

fn fold_call(kind: CallKind, source: Expr, args: Vec<Expr>) -> Expr {
    let folded = match kind {
        CallKind::ToLower => match source.as_constant() {
            Some(Bson::String(s)) => Some(Bson::String(s.to_lowercase())),
            _ => None,
        },
        CallKind::ToUpper => match source.as_constant() {
            Some(Bson::String(s)) => Some(Bson::String(s.to_uppercase())),
            _ => None,
        },
        CallKind::StartsWith | CallKind::EndsWith | CallKind::ContainsStr => {
            eval_pattern(kind, &source, &args)
        }
        _ => None,
    };
    match folded {
        Some(value) => Expr::Constant(value),
        None => Expr::Call {
            kind,
            source: Box::new(source),
            args,
        },
    }
}

fn eval_pattern(kind: CallKind, source: &Expr, args: &[Expr]) -> Option<Bson> {
    let Some(Bson::String(subject)) = source.as_constant() else {
        return None;
    };
    let Some(Bson::String(fragment)) = args.first().and_then(Expr::as_constant) else {
        return None;
    };
    let Some(Bson::Boolean(ci)) = args.get(1).and_then(Expr::as_constant) else {
        return None;
    };

    let (subject, fragment) = if *ci {
        (subject.to_lowercase(), fragment.to_lowercase())
    } else {
        (subject.clone(), fragment.clone())
    };
    let holds = match kind {
        CallKind::StartsWith => subject.starts_with(&fragment),
        CallKind::EndsWith => subject.ends_with(&fragment),
        CallKind::ContainsStr => subject.contains(&fragment),
        _ => return None,
    };
    Some(Bson::Boolean(holds))
}

fn eval_binary(op: BinaryOp, lhs: &Bson, rhs: &Bson) -> Option<Bson> {
    if op == BinaryOp::Add {
        if let (Bson::String(a), Bson::String(b)) = (lhs, rhs) {
            return Some(Bson::String(format!("{a}{b}")));
        }
    }
    if op.is_arithmetic() {
        return eval_arith(op, lhs, rhs);
    }
    if op.is_comparison() {
        return eval_compare(op, lhs, rhs);
    }
    None
}

enum Pair {
    I32(i32, i32),
    I64(i64, i64),
    F64(f64, f64),
}

#[allow(clippy::cast_precision_loss)]
fn promote(lhs: &Bson, rhs: &Bson) -> Option<Pair> {
    match (lhs, rhs) {
        (Bson::Int32(a), Bson::Int32(b)) => Some(Pair::I32(*a, *b)),
        (Bson::Int32(a), Bson::Int64(b)) => Some(Pair::I64(i64::from(*a), *b)),
        (Bson::Int64(a), Bson::Int32(b)) => Some(Pair::I64(*a, i64::from(*b))),
        (Bson::Int64(a), Bson::Int64(b)) => Some(Pair::I64(*a, *b)),
        (Bson::Double(a), Bson::Double(b)) => Some(Pair::F64(*a, *b)),
        (Bson::Double(a), Bson::Int32(b)) => Some(Pair::F64(*a, f64::from(*b))),
        (Bson::Int32(a), Bson::Double(b)) => Some(Pair::F64(f64::from(*a), *b)),
        (Bson::Double(a), Bson::Int64(b)) => Some(Pair::F64(*a, *b as f64)),
        (Bson::Int64(a), Bson::Double(b)) => Some(Pair::F64(*a as f64, *b)),
        _ => None,
    }
}

fn eval_arith(op: BinaryOp, lhs: &Bson, rhs: &Bson) -> Option<Bson> {
    match promote(lhs, rhs)? {
        Pair::I32(a, b) => {
            let value = match op {
                BinaryOp::Add => a.checked_add(b),
                BinaryOp::Subtract => a.checked_sub(b),
                BinaryOp::Multiply => a.checked_mul(b),
                BinaryOp::Divide => a.checked_div(b),
                BinaryOp::Modulo => a.checked_rem(b),
                _ => None,
            };
            value.map(Bson::Int32)
        }
        Pair::I64(a, b) => {
            let value = match op {
                BinaryOp::Add => a.checked_add(b),
                BinaryOp::Subtract => a.checked_sub(b),
                BinaryOp::Multiply => a.checked_mul(b),
                BinaryOp::Divide => a.checked_div(b),
                BinaryOp::Modulo => a.checked_rem(b),
                _ => None,
            };
            value.map(Bson::Int64)
        }
        Pair::F64(a, b) => {
            let value = match op {
                BinaryOp::Add => a + b,
                BinaryOp::Subtract => a - b,
                BinaryOp::Multiply => a * b,
                BinaryOp::Divide => a / b,
                BinaryOp::Modulo => a % b,
                _ => return None,
            };
            Some(Bson::Double(value))
        }
    }
}

fn eval_compare(op: BinaryOp, lhs: &Bson, rhs: &Bson) -> Option<Bson> {
    let ordering = match (lhs, rhs) {
        (Bson::String(a), Bson::String(b)) => Some(a.cmp(b)),
        (Bson::Boolean(a), Bson::Boolean(b)) => Some(a.cmp(b)),
        _ => match promote(lhs, rhs)? {
            Pair::I32(a, b) => Some(a.cmp(&b)),
            Pair::I64(a, b) => Some(a.cmp(&b)),
            Pair::F64(a, b) => a.partial_cmp(&b),
        },
    };
    let ordering = ordering?;

    let holds = match op {
        BinaryOp::Eq => ordering == Ordering::Equal,
        BinaryOp::Ne => ordering != Ordering::Equal,
        BinaryOp::Lt => ordering == Ordering::Less,
        BinaryOp::Lte => ordering != Ordering::Greater,
        BinaryOp::Gt => ordering == Ordering::Greater,
        BinaryOp::Gte => ordering != Ordering::Less,
        _ => return None,
    };
    Some(Bson::Boolean(holds))
}
