//! Module: lower::pipeline
//! Responsibility: rendering a bound chain as an aggregation pipeline.
//! Does not own: the decision to run one; `lower` falls back here when the
//! find builder refuses.
//! Boundary: stages are emitted innermost-first, so stage order is
//! application order. Client-side shaping is used wherever a stage can be
//! skipped without changing what the store sends back.

use crate::{
    error::UnsupportedQuery,
    exec::PipelineModel,
    ir::{
        aggregate_output_name, Aggregation, Aggregator, CollectionSource, Node, Projector,
        RootAggregationKind, Value,
    },
    translate,
};

use super::projection;
use bson::{Bson, Document};

/// Output name of a computed scalar projection stage.
const COMPUTED_FIELD: &str = "_fld0";

pub(crate) fn build(node: &Node) -> Result<PipelineModel, UnsupportedQuery> {
    let Node::Pipeline {
        source,
        projector,
        aggregator,
    } = node
    else {
        return Err(UnsupportedQuery::expression("the chain has no outer pipeline"));
    };

    let mut builder = PipelineBuilder::default();
    builder.emit(source)?;
    builder.finish(projector, aggregator.clone())
}

#[derive(Default)]
struct PipelineBuilder {
    source: Option<CollectionSource>,
    stages: Vec<Document>,
    client: Option<Projector>,
    root_aggregator: Option<Aggregator>,
    /// Whether an emitted stage has replaced the stored document shape.
    reshaped: bool,
}

impl PipelineBuilder {
    fn emit(&mut self, node: &Node) -> Result<(), UnsupportedQuery> {
        match node {
            Node::Collection(source) => {
                self.source = Some(source.clone());
                Ok(())
            }
            Node::Match { source, predicate } => {
                self.emit(source)?;
                self.push("$match", Bson::Document(translate::filter(predicate)?));
                Ok(())
            }
            Node::Sort { source, clauses } => {
                self.emit(source)?;
                self.push("$sort", Bson::Document(translate::sort_document(clauses)?));
                Ok(())
            }
            Node::SkipLimit {
                source,
                skip,
                limit,
            } => {
                self.emit(source)?;
                if let Some(skip) = skip {
                    self.push("$skip", Bson::Int64(clamped(*skip)));
                }
                if let Some(limit) = limit {
                    self.push("$limit", Bson::Int64(clamped(*limit)));
                }
                Ok(())
            }
            Node::Group {
                source,
                key,
                aggregations,
                ..
            } => {
                self.emit(source)?;
                self.push("$group", Bson::Document(group_body(key, aggregations)?));
                self.client = None;
                self.reshaped = true;
                Ok(())
            }
            Node::Distinct { source, projector } => {
                self.emit(source)?;
                match projector {
                    // a record key deduplicates on every field at once, the
                    // way a grouping with no accumulators would
                    Value::Record(_) => {
                        let mut body = Document::new();
                        body.insert("_id", translate::expression(projector)?);
                        self.push("$group", Bson::Document(body));
                    }
                    single_field => {
                        let field = single_field.as_stored_field().ok_or_else(|| {
                            UnsupportedQuery::expression("distinct requires a stored field")
                        })?;
                        let path = field.path.as_str();
                        // a native distinct skips rows missing the field
                        let mut exists = Document::new();
                        exists
                            .insert(path, Bson::Document(single("$exists", Bson::Boolean(true))));
                        self.push("$match", Bson::Document(exists));
                        let mut body = Document::new();
                        body.insert("_id", Bson::String(format!("${path}")));
                        self.push("$group", Bson::Document(body));
                    }
                }
                self.client = Some(Projector::Field("_id".to_string()));
                self.reshaped = true;
                Ok(())
            }
            Node::Project { source, projector } => {
                self.emit(source)?;
                self.emit_project(projector)
            }
            Node::RootAggregation {
                source,
                kind,
                argument,
            } => {
                self.emit(source)?;
                self.emit_root(*kind, argument)
            }
            Node::Pipeline { .. } => Err(UnsupportedQuery::expression(
                "nested chains are not supported",
            )),
        }
    }

    fn emit_project(&mut self, projector: &Value) -> Result<(), UnsupportedQuery> {
        if let Some(client) = projection::extractor(projector) {
            if self.reshaped {
                // the stream already carries every field read here; extract
                // client-side instead of renaming server-side
                self.client = Some(client);
                return Ok(());
            }
            let (fields, client) = projection::inclusion(projector)?;
            if !fields.is_empty() {
                self.push("$project", Bson::Document(fields));
            }
            self.client = Some(client);
            return Ok(());
        }

        match projector {
            Value::Record(fields) => {
                let mut body = Document::new();
                let mut entries = Vec::with_capacity(fields.len());
                for (name, value) in fields {
                    body.insert(name.clone(), translate::expression(value)?);
                    entries.push((name.clone(), Projector::Field(name.clone())));
                }
                self.push("$project", Bson::Document(body));
                self.client = Some(Projector::Record(entries));
            }
            computed => {
                let mut body = Document::new();
                body.insert(COMPUTED_FIELD, translate::expression(computed)?);
                self.push("$project", Bson::Document(body));
                self.client = Some(Projector::Field(COMPUTED_FIELD.to_string()));
            }
        }
        self.reshaped = true;
        Ok(())
    }

    fn emit_root(
        &mut self,
        kind: RootAggregationKind,
        argument: &Value,
    ) -> Result<(), UnsupportedQuery> {
        let rendered = if kind.is_count() {
            Bson::Int32(1)
        } else {
            match argument.as_field() {
                Some(field) => Bson::String(format!("${}", field.path)),
                None => {
                    let mut body = Document::new();
                    body.insert(COMPUTED_FIELD, translate::expression(argument)?);
                    self.push("$project", Bson::Document(body));
                    Bson::String(format!("${COMPUTED_FIELD}"))
                }
            }
        };

        let mut body = Document::new();
        body.insert("_id", Bson::Int32(1));
        body.insert(
            aggregate_output_name(0),
            Bson::Document(single(kind.operator(), rendered)),
        );
        self.push("$group", Bson::Document(body));

        self.client = Some(Projector::Field(aggregate_output_name(0)));
        self.root_aggregator = Some(match kind {
            RootAggregationKind::Count => Aggregator::Count { long: false },
            RootAggregationKind::CountLong => Aggregator::Count { long: true },
            RootAggregationKind::Sum => Aggregator::FirstOr(Bson::Int32(0)),
            RootAggregationKind::Avg | RootAggregationKind::Min | RootAggregationKind::Max => {
                Aggregator::First { or_none: false }
            }
        });
        self.reshaped = true;
        Ok(())
    }

    fn finish(
        self,
        projector: &Value,
        aggregator: Option<Aggregator>,
    ) -> Result<PipelineModel, UnsupportedQuery> {
        let source = self.source.ok_or_else(|| {
            UnsupportedQuery::expression("the chain has no collection source")
        })?;
        let client = match self.client {
            Some(client) => client,
            None => projection::extractor(projector).unwrap_or(Projector::Identity),
        };
        Ok(PipelineModel {
            collection: source.collection,
            document_type: source.document_type,
            stages: self.stages,
            projector: client,
            aggregator: aggregator.or(self.root_aggregator),
        })
    }

    fn push(&mut self, name: &str, body: Bson) {
        self.stages.push(single(name, body));
    }
}

fn group_body(key: &Value, aggregations: &[Aggregation]) -> Result<Document, UnsupportedQuery> {
    let mut body = Document::new();
    body.insert("_id", translate::expression(key)?);
    for (slot, aggregation) in aggregations.iter().enumerate() {
        body.insert(
            aggregate_output_name(slot),
            accumulator_body(aggregation)?,
        );
    }
    Ok(body)
}

fn accumulator_body(aggregation: &Aggregation) -> Result<Bson, UnsupportedQuery> {
    // pushing the whole element accumulates the input document itself
    if matches!(aggregation.argument, Value::Document { .. }) {
        return Ok(Bson::Document(single(
            aggregation.op.operator(),
            Bson::String("$$ROOT".to_string()),
        )));
    }
    Ok(Bson::Document(translate::accumulator(
        aggregation.op,
        &aggregation.argument,
    )?))
}

fn single(key: &str, value: Bson) -> Document {
    let mut doc = Document::new();
    doc.insert(key, value);
    doc
}

fn clamped(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
