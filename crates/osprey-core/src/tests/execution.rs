use super::*;
use crate::{lower::ExecutionTarget, translator::Translator, tree::record};
use bson::doc;

fn find_only() -> Translator {
    translator_with(TranslateOptions::default().with_targets(ExecutionTarget::FIND_ONLY))
}

fn pipeline_only() -> Translator {
    translator_with(TranslateOptions::default().with_targets(ExecutionTarget::PIPELINE_ONLY))
}

#[test]
fn find_and_pipeline_forms_agree_on_shaped_chains() {
    let q = customers_query()
        .filter(|c| c.get("x").gt(1))
        .sort_by(|c| c.get("x"))
        .skip(1)
        .take(2)
        .project(|c| c.get("x"));

    let find_form = find_only().translate(&q).expect("find translation");
    let pipeline_form = pipeline_only().translate(&q).expect("pipeline translation");
    assert!(matches!(find_form, Model::Find(_)));
    assert!(matches!(pipeline_form, Model::Pipeline(_)));

    let store = customer_store();
    let from_find = find_form.execute(&store).expect("find execution");
    let from_pipeline = pipeline_form.execute(&store).expect("pipeline execution");
    assert_eq!(from_find, from_pipeline);
    assert_eq!(
        from_find.into_values(),
        vec![Bson::Int32(3), Bson::Int32(5)]
    );
}

#[test]
fn find_and_pipeline_forms_agree_on_counts() {
    let q = customers_query().filter(|c| c.get("x").gt(1)).count();

    let store = customer_store();
    let from_find = find_only()
        .translate(&q)
        .expect("find translation")
        .execute(&store)
        .expect("find execution");
    let from_pipeline = pipeline_only()
        .translate(&q)
        .expect("pipeline translation")
        .execute(&store)
        .expect("pipeline execution");

    assert_eq!(from_find, Output::One(Bson::Int32(4)));
    assert_eq!(from_pipeline, Output::One(Bson::Int32(4)));
}

#[test]
fn find_only_refuses_pipeline_shapes() {
    let q = customers_query()
        .group_by(|c| c.get("b"))
        .project(|g| record([("key", g.clone().key()), ("n", g.count())]));

    let err = find_only()
        .translate(&q)
        .expect_err("grouping has no find form");
    let message = err.to_string();
    assert!(message.contains("no execution form for find"), "{message}");
    assert!(message.contains("grouping has no find form"), "{message}");
}

#[test]
fn find_only_refuses_repeated_stages() {
    let split_sort = customers_query()
        .sort_by(|c| c.get("a"))
        .filter(|c| c.get("x").lt(8))
        .sort_by(|c| c.get("b"));
    let split_filter = customers_query()
        .filter(|c| c.get("b").eq(false))
        .sort_by(|c| c.get("a"))
        .filter(|c| c.get("x").lt(8));
    let split_window = customers_query().skip(1).project(|c| c.get("x")).take(2);

    let cases = [
        (split_sort, "a second sort has no find form"),
        (split_filter, "a second filter has no find form"),
        (split_window, "a second skip or take has no find form"),
    ];
    for (q, reason) in cases {
        let err = find_only().translate(&q).expect_err(reason);
        let message = err.to_string();
        assert!(message.contains(reason), "{message}");
    }
}

#[test]
fn best_effort_failures_cite_both_targets() {
    let q = customers_query().flat_map(|c| c.get("tags"));
    let err = translator_with(TranslateOptions::default())
        .translate(&q)
        .expect_err("flat_map is never translated");
    let message = err.to_string();
    assert!(
        message.contains("no execution form for find or pipeline"),
        "{message}"
    );
}

#[test]
fn pipeline_only_renders_stages_for_findable_chains() {
    let q = customers_query().filter(|c| c.get("x").gt(3));
    let model = pipeline_only().translate(&q).expect("pipeline translation");
    let Model::Pipeline(pipeline) = &model else {
        panic!("expected a pipeline model");
    };
    assert_eq!(
        pipeline.stages,
        vec![doc! { "$match": { "x": { "$gt": 3 } } }]
    );

    let rows = model
        .execute(&customer_store())
        .expect("pipeline execution")
        .into_values();
    assert_eq!(xs(&rows), vec![5, 8]);
}

#[test]
fn repeated_translations_render_identical_bytes() {
    let q = customers_query()
        .filter(|c| c.get("x").gt(1))
        .group_by(|c| c.get("b"))
        .project(|g| record([("key", g.clone().key()), ("n", g.count())]));

    // fresh translator per call, so any ordering drift would show up here
    let first = pipeline_model(&q);
    let second = pipeline_model(&q);
    assert_eq!(first, second);

    let stage_bytes = |model: &PipelineModel| -> Vec<Vec<u8>> {
        model
            .stages
            .iter()
            .map(|stage| bson::to_vec(stage).expect("stage serializes"))
            .collect()
    };
    assert_eq!(stage_bytes(&first), stage_bytes(&second));
}

#[test]
fn injected_filters_merge_with_built_ones() {
    let q = customers_query()
        .filter_document(doc! { "a": { "$gte": 10 } })
        .filter(|c| c.get("b").eq(false));
    let model = find_model(&q);
    assert_eq!(model.filter, doc! { "a": { "$gte": 10 }, "b": false });

    let rows = run_values(&q);
    assert_eq!(xs(&rows), vec![5, 2, 8, 3]);
}

#[test]
fn injected_filters_pass_through_unparsed_operators() {
    // a two-operator range on one key is a shape the builder never emits
    let q = customers_query().filter_document(doc! { "x": { "$gte": 2, "$lte": 5 } });
    let model = find_model(&q);
    assert_eq!(model.filter, doc! { "x": { "$gte": 2, "$lte": 5 } });

    let rows = run_values(&q);
    assert_eq!(xs(&rows), vec![5, 2, 3]);
}
