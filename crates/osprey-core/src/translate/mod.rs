//! Module: translate
//! Responsibility: rendering bound values into wire documents.
//! Does not own: execution-form selection; `lower` decides which documents
//! to ask for.
//! Boundary: one value grammar, two renderings. Predicates become query
//! filter documents, everything else becomes aggregation expressions.

mod predicate;
mod value;

pub(crate) use predicate::filter;
pub(crate) use value::expression;

use crate::{
    error::UnsupportedQuery,
    ir::{AggregationOp, SortClause, Value},
};
use bson::Document;

/// Render an accumulator for a `$group` stage.
pub(crate) fn accumulator(
    op: AggregationOp,
    argument: &Value,
) -> Result<Document, UnsupportedQuery> {
    let mut doc = Document::new();
    doc.insert(op.operator(), expression(argument)?);
    Ok(doc)
}

/// Render sort clauses as a sort document. Clause order is key order.
pub(crate) fn sort_document(clauses: &[SortClause]) -> Result<Document, UnsupportedQuery> {
    let mut doc = Document::new();
    for clause in clauses {
        let Value::Field(field) = &clause.value else {
            return Err(UnsupportedQuery::expression(
                "sorting requires document fields",
            ));
        };
        doc.insert(field.path.as_str(), clause.direction.order());
    }
    Ok(doc)
}
