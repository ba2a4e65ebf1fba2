//! Module: lower::projection
//! Responsibility: deriving wire projections and client-side extractors
//! from a projection value.
//! Does not own: computed projections; those are rendered as stages by the
//! pipeline builder.
//! Boundary: an inclusion projection never widens what the store returns.
//! A field path is included only if the projector reads it.

use crate::{
    cache::param,
    error::UnsupportedQuery,
    ir::{Projector, Value},
};
use bson::{Bson, Document};

/// Derive the wire inclusion document and client extractor of a
/// field-shaped projection.
///
/// Included paths are sorted and hierarchically pruned, so reading both a
/// document field and one of its members includes the document once.
pub(crate) fn inclusion(value: &Value) -> Result<(Document, Projector), UnsupportedQuery> {
    let mut paths = Vec::new();
    let projector = extract_stored(value, &mut paths)?;

    paths.sort();
    paths.dedup();
    let mut included: Vec<&str> = Vec::new();
    for path in &paths {
        let covered = included.iter().any(|kept| {
            path.strip_prefix(kept)
                .is_some_and(|rest| rest.starts_with('.'))
        });
        if !covered {
            included.push(path);
        }
    }

    let mut doc = Document::new();
    for path in included {
        doc.insert(path, Bson::Int32(1));
    }
    Ok((doc, projector))
}

fn extract_stored(value: &Value, paths: &mut Vec<String>) -> Result<Projector, UnsupportedQuery> {
    match value {
        Value::Field(field) => {
            if field.projected {
                return Err(UnsupportedQuery::expression(
                    "a computed field cannot be fetched by a find",
                ));
            }
            paths.push(field.path.clone().into_string());
            Ok(Projector::Field(field.path.clone().into_string()))
        }
        Value::Constant(constant) => Ok(Projector::Constant(constant.clone())),
        Value::Parameter { slot, codec } => Ok(Projector::Constant(Bson::Document(
            param::marker(*slot, *codec),
        ))),
        Value::Record(fields) => {
            let mut entries = Vec::with_capacity(fields.len());
            for (name, field) in fields {
                entries.push((name.clone(), extract_stored(field, paths)?));
            }
            Ok(Projector::Record(entries))
        }
        _ => Err(UnsupportedQuery::expression(
            "projections over computed values have no find form",
        )),
    }
}

/// Derive a client-side extractor when the projection reads the result
/// documents without computing anything new.
pub(crate) fn extractor(value: &Value) -> Option<Projector> {
    match value {
        Value::Document { .. } => Some(Projector::Identity),
        Value::Field(field) => Some(Projector::Field(field.path.clone().into_string())),
        Value::Constant(constant) => Some(Projector::Constant(constant.clone())),
        Value::Parameter { slot, codec } => Some(Projector::Constant(Bson::Document(
            param::marker(*slot, *codec),
        ))),
        Value::Record(fields) => {
            let mut entries = Vec::with_capacity(fields.len());
            for (name, field) in fields {
                entries.push((name.clone(), extractor(field)?));
            }
            Some(Projector::Record(entries))
        }
        _ => None,
    }
}
