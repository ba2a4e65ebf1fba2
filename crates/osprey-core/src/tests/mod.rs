//! Chain-level tests: build a query, translate it, and check the rendered
//! model or run it against the in-memory collection. Rendering grammars
//! have their own unit tests next to their modules; these cover the way
//! the stages compose.

mod caching;
mod execution;

use crate::{
    error::TranslateError,
    exec::{FindModel, Model, Output, PipelineModel},
    test_support::fixtures::{
        customer_store, customers_query, translator_with, uncached_translator, xs,
    },
    translator::TranslateOptions,
    tree::Queryable,
};
use bson::Bson;

fn translate(query: &Queryable) -> Model {
    uncached_translator()
        .translate(query)
        .expect("translation should succeed")
}

fn find_model(query: &Queryable) -> FindModel {
    match translate(query) {
        Model::Find(model) => model,
        Model::Pipeline(model) => panic!("expected a find model, got stages {:?}", model.stages),
    }
}

fn pipeline_model(query: &Queryable) -> PipelineModel {
    match translate(query) {
        Model::Pipeline(model) => model,
        Model::Find(model) => panic!("expected a pipeline model, got find {model:?}"),
    }
}

fn run(query: &Queryable) -> Output {
    translate(query)
        .execute(&customer_store())
        .expect("execution should succeed")
}

fn run_values(query: &Queryable) -> Vec<Bson> {
    run(query).into_values()
}

fn run_one(query: &Queryable) -> Bson {
    run(query)
        .into_single()
        .expect("expected a single-value output")
}

fn unsupported_reason(query: &Queryable) -> String {
    match uncached_translator().translate(query) {
        Err(TranslateError::Unsupported { source, .. }) => source.reason,
        other => panic!("expected an unsupported-query failure, got {other:?}"),
    }
}
