//! Module: lower::query
//! Responsibility: rendering a bound chain as a single find, count or
//! distinct call.
//! Does not own: chains a find cannot express; those surface as
//! `UnsupportedQuery` and the caller decides whether a pipeline may run.
//! Boundary: a find form is order-rigid. Filters come before sorts, sorts
//! before windows, and nothing follows a distinct. Each stage appears at
//! most once; adjacent repeats are merged by the rewrite passes, so a
//! repeat surviving to this point has a pipeline-only stage between its
//! halves and the chain must run as a pipeline.

use crate::{
    error::UnsupportedQuery,
    exec::FindModel,
    ir::{
        Aggregator, CollectionSource, CountWidth, Direction, Node, Projector,
        RootAggregationKind, SortClause, Value,
    },
    translate,
};

use super::projection;
use bson::Document;

/// Stage ranks of the find order. Absorbing a node of a lower rank than
/// one already absorbed means the chain re-enters an earlier stage, which
/// a single find cannot express.
const RANK_MATCH: u8 = 0;
const RANK_SORT: u8 = 1;
const RANK_WINDOW: u8 = 2;
const RANK_DISTINCT: u8 = 3;

pub(crate) fn build(node: &Node) -> Result<FindModel, UnsupportedQuery> {
    let Node::Pipeline {
        source,
        projector,
        aggregator,
    } = node
    else {
        return Err(UnsupportedQuery::expression("the chain has no outer pipeline"));
    };

    let mut state = FindState::default();
    state.absorb(source)?;
    state.finish(projector, aggregator.clone())
}

#[derive(Default)]
struct FindState {
    source: Option<CollectionSource>,
    predicate: Option<Value>,
    sort: Option<Document>,
    skip: Option<u64>,
    limit: Option<u64>,
    distinct_field: Option<String>,
    root: Option<RootPlan>,
    rank: u8,
}

enum RootPlan {
    Count(CountWidth),
    Extremum { path: String, direction: Direction },
}

impl FindState {
    fn absorb(&mut self, node: &Node) -> Result<(), UnsupportedQuery> {
        match node {
            Node::Collection(source) => {
                self.source = Some(source.clone());
                Ok(())
            }
            Node::Match { source, predicate } => {
                self.absorb(source)?;
                self.enter(RANK_SORT, "a filter after a skip, take or distinct")?;
                if self.predicate.is_some() {
                    return Err(UnsupportedQuery::expression(
                        "a second filter has no find form",
                    ));
                }
                self.predicate = Some(predicate.clone());
                Ok(())
            }
            Node::Sort { source, clauses } => {
                self.absorb(source)?;
                self.enter(RANK_SORT, "a sort after a skip, take or distinct")?;
                if self.sort.is_some() {
                    return Err(UnsupportedQuery::expression(
                        "a second sort has no find form",
                    ));
                }
                self.sort = Some(stored_sort(clauses)?);
                self.rank = RANK_SORT;
                Ok(())
            }
            Node::SkipLimit {
                source,
                skip,
                limit,
            } => {
                self.absorb(source)?;
                self.enter(RANK_WINDOW, "a skip or take after a distinct")?;
                if self.skip.is_some() || self.limit.is_some() {
                    return Err(UnsupportedQuery::expression(
                        "a second skip or take has no find form",
                    ));
                }
                self.skip = *skip;
                self.limit = *limit;
                self.rank = RANK_WINDOW;
                Ok(())
            }
            Node::Distinct { source, projector } => {
                self.absorb(source)?;
                if self.sort.is_some() || self.skip.is_some() || self.limit.is_some() {
                    return Err(UnsupportedQuery::expression(
                        "a distinct after a sort, skip or take has no find form",
                    ));
                }
                let field = projector.as_stored_field().ok_or_else(|| {
                    UnsupportedQuery::expression("distinct requires a stored field")
                })?;
                self.distinct_field = Some(field.path.clone().into_string());
                self.rank = RANK_DISTINCT;
                Ok(())
            }
            // reshaping is client-side in a find; the pipeline wrapper
            // carries the final projection value
            Node::Project { source, .. } => self.absorb(source),
            Node::Group { .. } => Err(UnsupportedQuery::expression(
                "grouping has no find form",
            )),
            Node::RootAggregation {
                source,
                kind,
                argument,
            } => {
                self.absorb(source)?;
                self.absorb_root(*kind, argument)
            }
            Node::Pipeline { .. } => Err(UnsupportedQuery::expression(
                "nested chains are not supported",
            )),
        }
    }

    fn absorb_root(
        &mut self,
        kind: RootAggregationKind,
        argument: &Value,
    ) -> Result<(), UnsupportedQuery> {
        match kind {
            RootAggregationKind::Count | RootAggregationKind::CountLong => {
                if self.distinct_field.is_some() {
                    return Err(UnsupportedQuery::expression(
                        "counting distinct values has no find form",
                    ));
                }
                let width = if matches!(kind, RootAggregationKind::Count) {
                    CountWidth::Int32
                } else {
                    CountWidth::Int64
                };
                self.root = Some(RootPlan::Count(width));
                Ok(())
            }
            RootAggregationKind::Min | RootAggregationKind::Max => {
                if self.rank > RANK_MATCH {
                    return Err(UnsupportedQuery::expression(
                        "an extremum after a sort, window or distinct has no find form",
                    ));
                }
                let field = argument.as_stored_field().ok_or_else(|| {
                    UnsupportedQuery::expression(
                        "an extremum over a computed value has no find form",
                    )
                })?;
                let direction = if matches!(kind, RootAggregationKind::Min) {
                    Direction::Asc
                } else {
                    Direction::Desc
                };
                self.root = Some(RootPlan::Extremum {
                    path: field.path.clone().into_string(),
                    direction,
                });
                Ok(())
            }
            RootAggregationKind::Sum | RootAggregationKind::Avg => Err(
                UnsupportedQuery::expression("a sum or average has no find form"),
            ),
        }
    }

    fn enter(&self, ceiling: u8, what: &str) -> Result<(), UnsupportedQuery> {
        if self.rank > ceiling {
            return Err(UnsupportedQuery::expression(format!(
                "{what} has no find form"
            )));
        }
        Ok(())
    }

    fn finish(
        self,
        projector: &Value,
        aggregator: Option<Aggregator>,
    ) -> Result<FindModel, UnsupportedQuery> {
        let source = self.source.ok_or_else(|| {
            UnsupportedQuery::expression("the chain has no collection source")
        })?;
        let filter = match &self.predicate {
            Some(predicate) => translate::filter(predicate)?,
            None => Document::new(),
        };

        if let Some(root) = self.root {
            return Self::finish_root(root, source, filter, self.skip, self.limit, projector);
        }

        let (projection, client) = if self.distinct_field.is_some() {
            // distinct results arrive as bare values
            (None, Projector::Identity)
        } else {
            match projector {
                Value::Document { .. } => (None, Projector::Identity),
                shaped => {
                    let (fields, client) = projection::inclusion(shaped)?;
                    (Some(fields), client)
                }
            }
        };

        Ok(FindModel {
            collection: source.collection,
            document_type: source.document_type,
            filter,
            projection,
            sort: self.sort,
            skip: self.skip,
            limit: self.limit,
            distinct_field: self.distinct_field,
            count: None,
            projector: client,
            aggregator,
        })
    }

    fn finish_root(
        root: RootPlan,
        source: CollectionSource,
        filter: Document,
        skip: Option<u64>,
        limit: Option<u64>,
        projector: &Value,
    ) -> Result<FindModel, UnsupportedQuery> {
        match root {
            RootPlan::Count(width) => Ok(FindModel {
                collection: source.collection,
                document_type: source.document_type,
                filter,
                projection: None,
                sort: None,
                skip,
                limit,
                distinct_field: None,
                count: Some(width),
                projector: projection::extractor(projector).unwrap_or(Projector::Identity),
                aggregator: None,
            }),
            RootPlan::Extremum { path, direction } => {
                let mut sort = Document::new();
                sort.insert(path.as_str(), direction.order());
                let mut fields = Document::new();
                fields.insert(path.as_str(), 1);
                Ok(FindModel {
                    collection: source.collection,
                    document_type: source.document_type,
                    filter,
                    projection: Some(fields),
                    sort: Some(sort),
                    skip: None,
                    limit: Some(1),
                    distinct_field: None,
                    count: None,
                    projector: Projector::Field(path),
                    aggregator: Some(Aggregator::First { or_none: false }),
                })
            }
        }
    }
}

/// Render sort clauses, requiring every key to be a stored field. Sorting
/// on anything synthesized needs the reshaping stage a find cannot run.
fn stored_sort(clauses: &[SortClause]) -> Result<Document, UnsupportedQuery> {
    for clause in clauses {
        if clause.value.as_stored_field().is_none() {
            return Err(UnsupportedQuery::expression(
                "sorting on a computed value has no find form",
            ));
        }
    }
    translate::sort_document(clauses)
}
