//! Deterministic template fingerprinting for the translation cache.
//!
//! Lambda variables are numbered by first occurrence in the walk, never by
//! their process-global ids, so structurally equal templates built at
//! different times fingerprint the same.
#![allow(clippy::cast_possible_truncation)]

use crate::{
    lower::ExecutionTarget,
    tree::{Expr, VarId},
};
use bson::{Bson, Document};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

///
/// Fingerprint
///
/// Stable, deterministic fingerprint of a parameterized template and the
/// execution targets it was translated for.
///

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    #[must_use]
    pub(crate) fn of(template: &Expr, targets: ExecutionTarget) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"ospreyfp:v1");
        write_tag(&mut hasher, u8::from(targets.find));
        write_tag(&mut hasher, u8::from(targets.pipeline));
        let mut vars = VarNumbering::default();
        hash_expr(&mut hasher, template, &mut vars);

        let digest = hasher.finalize();
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        Self(out)
    }

    #[must_use]
    pub fn as_hex(&self) -> String {
        let mut out = String::with_capacity(64);
        for byte in self.0 {
            use std::fmt::Write as _;
            let _ = write!(out, "{byte:02x}");
        }
        out
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.as_hex())
    }
}

#[derive(Default)]
struct VarNumbering {
    seen: HashMap<VarId, u32>,
}

impl VarNumbering {
    fn number(&mut self, var: VarId) -> u32 {
        let next = self.seen.len() as u32;
        *self.seen.entry(var).or_insert(next)
    }
}

fn hash_expr(hasher: &mut Sha256, expr: &Expr, vars: &mut VarNumbering) {
    match expr {
        Expr::Source(source) => {
            write_tag(hasher, 0x01);
            write_str(hasher, &source.collection);
            write_str(hasher, &source.document_type);
        }
        Expr::Constant(value) => {
            write_tag(hasher, 0x02);
            write_bson(hasher, value);
        }
        Expr::Parameter(slot) => {
            write_tag(hasher, 0x03);
            write_u32(hasher, *slot);
        }
        Expr::Var(var) => {
            write_tag(hasher, 0x04);
            write_u32(hasher, vars.number(*var));
        }
        Expr::Member { source, name } => {
            write_tag(hasher, 0x05);
            hash_expr(hasher, source, vars);
            write_str(hasher, name);
        }
        Expr::Call { kind, source, args } => {
            write_tag(hasher, 0x06);
            write_str(hasher, kind.name());
            hash_expr(hasher, source, vars);
            write_u32(hasher, args.len() as u32);
            for arg in args {
                hash_expr(hasher, arg, vars);
            }
        }
        Expr::Binary { op, left, right } => {
            write_tag(hasher, 0x07);
            write_tag(hasher, *op as u8);
            hash_expr(hasher, left, vars);
            hash_expr(hasher, right, vars);
        }
        Expr::Unary { op, operand } => {
            write_tag(hasher, 0x08);
            write_tag(hasher, *op as u8);
            hash_expr(hasher, operand, vars);
        }
        Expr::Conditional {
            condition,
            then,
            otherwise,
        } => {
            write_tag(hasher, 0x09);
            hash_expr(hasher, condition, vars);
            hash_expr(hasher, then, vars);
            hash_expr(hasher, otherwise, vars);
        }
        Expr::Record(fields) => {
            write_tag(hasher, 0x0a);
            write_u32(hasher, fields.len() as u32);
            for (name, value) in fields {
                write_str(hasher, name);
                hash_expr(hasher, value, vars);
            }
        }
        Expr::Sequence(items) => {
            write_tag(hasher, 0x0b);
            write_u32(hasher, items.len() as u32);
            for item in items {
                hash_expr(hasher, item, vars);
            }
        }
        Expr::Lambda { var, body } => {
            write_tag(hasher, 0x0c);
            write_u32(hasher, vars.number(*var));
            hash_expr(hasher, body, vars);
        }
        Expr::InjectedFilter(doc) => {
            write_tag(hasher, 0x0d);
            write_document(hasher, doc);
        }
    }
}

fn write_bson(hasher: &mut Sha256, value: &Bson) {
    let mut wrapper = Document::new();
    wrapper.insert("v", value.clone());
    write_document(hasher, &wrapper);
}

fn write_document(hasher: &mut Sha256, doc: &Document) {
    match bson::to_vec(doc) {
        Ok(bytes) => {
            write_u32(hasher, bytes.len() as u32);
            hasher.update(&bytes);
        }
        Err(_) => write_str(hasher, &format!("{doc:?}")),
    }
}

fn write_str(hasher: &mut Sha256, value: &str) {
    write_u32(hasher, value.len() as u32);
    hasher.update(value.as_bytes());
}

fn write_u32(hasher: &mut Sha256, value: u32) {
    hasher.update(value.to_be_bytes());
}

fn write_tag(hasher: &mut Sha256, tag: u8) {
    hasher.update([tag]);
}
