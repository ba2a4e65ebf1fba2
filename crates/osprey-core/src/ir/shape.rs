//! Module: ir::shape
//! Responsibility: the client-side completion of a translated query, held as
//! plain data so it can live inside a cached translation.
//! Does not own: stage rendering or backend calls.
//! Boundary: applied by model execution after the backend returned rows.

use crate::error::{ExecuteError, SequenceError};
use bson::{Bson, Document};

///
/// Projector
///
/// Row-shaping applied to every returned document. Kept as data rather than
/// a closure so translations stay comparable and cacheable.
///

#[derive(Clone, Debug, PartialEq)]
pub enum Projector {
    /// The row as returned.
    Identity,
    /// Extraction of one dotted path; missing paths yield null.
    Field(String),
    /// Record construction from nested projectors.
    Record(Vec<(String, Projector)>),
    /// A constant injected client-side.
    Constant(Bson),
}

impl Projector {
    #[must_use]
    pub fn apply(&self, row: &Document) -> Bson {
        match self {
            Self::Identity => Bson::Document(row.clone()),
            Self::Field(path) => extract(row, path),
            Self::Record(fields) => {
                let mut out = Document::new();
                for (name, projector) in fields {
                    out.insert(name.clone(), projector.apply(row));
                }
                Bson::Document(out)
            }
            Self::Constant(value) => value.clone(),
        }
    }
}

/// Dotted-path extraction over nested documents.
fn extract(row: &Document, path: &str) -> Bson {
    let mut current = row;
    let mut parts = path.split('.').peekable();
    while let Some(part) = parts.next() {
        match current.get(part) {
            Some(Bson::Document(inner)) if parts.peek().is_some() => current = inner,
            Some(value) if parts.peek().is_none() => return value.clone(),
            _ => return Bson::Null,
        }
    }
    Bson::Null
}

///
/// Aggregator
///
/// Cardinality completion applied to the projected rows. Mirrors the
/// terminal operator that ended the chain.
///

#[derive(Clone, Debug, PartialEq)]
pub enum Aggregator {
    First { or_none: bool },
    /// First row, or a fixed value when the backend returned none. Used for
    /// aggregates with a defined empty-sequence result, such as counts.
    FirstOr(Bson),
    Single { or_none: bool },
    Last { or_none: bool },
    /// True when any row came back.
    Any,
    /// True when no row came back.
    NoneMatched,
    /// Numeric count read from the first row, width-checked.
    Count { long: bool },
}

impl Aggregator {
    pub fn apply(&self, mut rows: Vec<Bson>) -> Result<Bson, ExecuteError> {
        match self {
            Self::First { or_none } => rows
                .into_iter()
                .next()
                .map_or_else(|| missing_element(*or_none), Ok),
            Self::FirstOr(default) => {
                Ok(rows.into_iter().next().unwrap_or_else(|| default.clone()))
            }
            Self::Single { or_none } => {
                if rows.len() > 1 {
                    return Err(SequenceError::MoreThanOne.into());
                }
                rows.pop().map_or_else(|| missing_element(*or_none), Ok)
            }
            Self::Last { or_none } => {
                rows.pop().map_or_else(|| missing_element(*or_none), Ok)
            }
            Self::Any => Ok(Bson::Boolean(!rows.is_empty())),
            Self::NoneMatched => Ok(Bson::Boolean(rows.is_empty())),
            Self::Count { long } => {
                let raw = rows.into_iter().next().unwrap_or(Bson::Int64(0));
                let count = integral(&raw)
                    .ok_or_else(|| ExecuteError::NonNumericCount {
                        found: format!("{raw}"),
                    })?;
                let width = if *long {
                    CountWidth::Int64
                } else {
                    CountWidth::Int32
                };
                width.render(count)
            }
        }
    }
}

fn missing_element(or_none: bool) -> Result<Bson, ExecuteError> {
    if or_none {
        Ok(Bson::Null)
    } else {
        Err(SequenceError::NoElements.into())
    }
}

#[allow(clippy::cast_possible_truncation)]
fn integral(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(n) => Some(i64::from(*n)),
        Bson::Int64(n) => Some(*n),
        Bson::Double(n) if n.fract() == 0.0 => Some(*n as i64),
        _ => None,
    }
}

///
/// CountWidth
///
/// The numeric width a count terminal promised its caller.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CountWidth {
    Int32,
    Int64,
}

impl CountWidth {
    /// Render a backend count in this width, refusing silent truncation.
    pub fn render(self, count: i64) -> Result<Bson, ExecuteError> {
        #[allow(clippy::cast_sign_loss)]
        let unsigned = count.max(0) as u64;
        match self {
            Self::Int32 => i32::try_from(count)
                .map(Bson::Int32)
                .map_err(|_| ExecuteError::CountOverflow {
                    count: unsigned,
                    width: "int32",
                }),
            Self::Int64 => Ok(Bson::Int64(count)),
        }
    }

    /// Render an unsigned backend count in this width.
    pub fn render_unsigned(self, count: u64) -> Result<Bson, ExecuteError> {
        match self {
            Self::Int32 => i32::try_from(count)
                .map(Bson::Int32)
                .map_err(|_| ExecuteError::CountOverflow {
                    count,
                    width: "int32",
                }),
            Self::Int64 => i64::try_from(count)
                .map(Bson::Int64)
                .map_err(|_| ExecuteError::CountOverflow {
                    count,
                    width: "int64",
                }),
        }
    }
}
