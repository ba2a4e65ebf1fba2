use super::*;
use crate::{
    cache::CacheStats,
    obs::{metrics_report, TraceFailure, TraceForm, TranslateTraceEvent, TranslateTraceSink},
    translator::Translator,
};
use bson::{doc, Document, Regex};
use std::sync::Mutex;

fn cached_translator() -> Translator {
    translator_with(TranslateOptions::default())
}

fn translate_with(translator: &Translator, query: &Queryable) -> Model {
    translator
        .translate(query)
        .expect("translation should succeed")
}

fn filter_of(model: &Model) -> Document {
    match model {
        Model::Find(find) => find.filter.clone(),
        Model::Pipeline(model) => panic!("expected a find model, got stages {:?}", model.stages),
    }
}

fn rows_of(model: &Model) -> Vec<Bson> {
    model
        .execute(&customer_store())
        .expect("execution should succeed")
        .into_values()
}

#[test]
fn repeated_shapes_share_one_cached_template() {
    let translator = cached_translator();

    let first = translate_with(&translator, &customers_query().filter(|c| c.get("x").gt(3)));
    let second = translate_with(&translator, &customers_query().filter(|c| c.get("x").gt(5)));

    assert_eq!(
        translator.cache_stats(),
        CacheStats {
            hits: 1,
            misses: 1,
            size: 1,
        }
    );
    assert_eq!(filter_of(&first), doc! { "x": { "$gt": 3 } });
    assert_eq!(filter_of(&second), doc! { "x": { "$gt": 5 } });
    assert_eq!(xs(&rows_of(&first)), vec![5, 8]);
    assert_eq!(xs(&rows_of(&second)), vec![8]);
}

#[test]
fn substitution_rebinds_every_slot() {
    let translator = cached_translator();

    let first = translate_with(
        &translator,
        &customers_query().filter(|c| c.clone().get("x").gte(1).and(c.get("s").eq("alpha"))),
    );
    let second = translate_with(
        &translator,
        &customers_query().filter(|c| c.clone().get("x").gte(2).and(c.get("s").eq("gamma"))),
    );

    assert_eq!(
        translator.cache_stats(),
        CacheStats {
            hits: 1,
            misses: 1,
            size: 1,
        }
    );
    // cached equalities keep the wrapped form; the template's shape cannot
    // depend on which value fills the slot
    assert_eq!(
        filter_of(&second),
        doc! { "x": { "$gte": 2 }, "s": { "$eq": "gamma" } }
    );
    assert_eq!(xs(&rows_of(&first)), vec![1]);
    assert_eq!(xs(&rows_of(&second)), vec![2]);
}

#[test]
fn structural_constants_key_separate_templates() {
    let translator = cached_translator();

    let one = translate_with(&translator, &customers_query().sort_by(|c| c.get("x")).skip(1));
    let two = translate_with(&translator, &customers_query().sort_by(|c| c.get("x")).skip(2));

    // window counts stay in the template, so the chains do not share one
    assert_eq!(
        translator.cache_stats(),
        CacheStats {
            hits: 0,
            misses: 2,
            size: 2,
        }
    );
    let Model::Find(one) = one else {
        panic!("expected a find model");
    };
    let Model::Find(two) = two else {
        panic!("expected a find model");
    };
    assert_eq!(one.skip, Some(1));
    assert_eq!(two.skip, Some(2));
}

#[test]
fn cased_comparisons_are_never_parameterized() {
    let translator = cached_translator();

    let possible = translate_with(
        &translator,
        &customers_query().filter(|c| c.get("s").to_lower().eq("beta")),
    );
    let impossible = translate_with(
        &translator,
        &customers_query().filter(|c| c.get("s").to_lower().eq("BETA")),
    );

    // sharing a template here would hand the second chain the first one's
    // regex; the compared string is part of the shape instead
    assert_eq!(
        translator.cache_stats(),
        CacheStats {
            hits: 0,
            misses: 2,
            size: 2,
        }
    );
    assert_eq!(
        filter_of(&possible),
        doc! { "s": Bson::RegularExpression(Regex {
            pattern: "^beta$".to_string(),
            options: "i".to_string(),
        }) }
    );
    assert_eq!(filter_of(&impossible), doc! { "$nor": [ {} ] });
    assert_eq!(xs(&rows_of(&possible)), vec![5]);
    assert_eq!(rows_of(&impossible), Vec::<Bson>::new());
}

#[test]
fn parameter_codecs_encode_at_substitution() {
    let translator = cached_translator();

    let first = translate_with(&translator, &customers_query().filter(|c| c.get("code").eq(100)));
    let second = translate_with(&translator, &customers_query().filter(|c| c.get("code").eq(200)));

    assert_eq!(
        translator.cache_stats(),
        CacheStats {
            hits: 1,
            misses: 1,
            size: 1,
        }
    );
    assert_eq!(filter_of(&first), doc! { "code": { "$eq": "100" } });
    assert_eq!(filter_of(&second), doc! { "code": { "$eq": "200" } });
    assert_eq!(xs(&rows_of(&first)), vec![1, 2]);
    assert_eq!(xs(&rows_of(&second)), vec![5, 3]);
}

#[test]
fn failed_translations_are_not_cached() {
    let translator = cached_translator();
    let q = customers_query().flat_map(|c| c.get("tags"));

    for _ in 0..2 {
        let result = translator.translate(&q);
        assert!(matches!(result, Err(TranslateError::Unsupported { .. })));
    }

    assert_eq!(
        translator.cache_stats(),
        CacheStats {
            hits: 0,
            misses: 2,
            size: 0,
        }
    );
}

#[test]
fn the_oldest_template_is_evicted_at_capacity() {
    let translator = translator_with(TranslateOptions::default().with_cache_capacity(1));
    let filter_chain = customers_query().filter(|c| c.get("x").gt(3));
    let sort_chain = customers_query().sort_by(|c| c.get("a"));

    translate_with(&translator, &filter_chain);
    translate_with(&translator, &sort_chain);
    translate_with(&translator, &filter_chain);

    assert_eq!(
        translator.cache_stats(),
        CacheStats {
            hits: 0,
            misses: 3,
            size: 1,
        }
    );
}

#[test]
fn a_hit_refreshes_recency() {
    let translator = translator_with(TranslateOptions::default().with_cache_capacity(2));
    let first = customers_query().filter(|c| c.get("x").gt(3));
    let second = customers_query().sort_by(|c| c.get("a"));
    let third = customers_query().take(2);

    translate_with(&translator, &first);
    translate_with(&translator, &second);
    // touching the first chain makes the second the eviction candidate
    translate_with(&translator, &first);
    translate_with(&translator, &third);
    translate_with(&translator, &second);

    assert_eq!(
        translator.cache_stats(),
        CacheStats {
            hits: 1,
            misses: 4,
            size: 2,
        }
    );
}

#[test]
fn disabled_caching_skips_the_cache_entirely() {
    let translator = uncached_translator();

    for _ in 0..2 {
        let model = translate_with(&translator, &customers_query().filter(|c| c.get("x").gt(3)));
        // nothing was parameterized, so equality comparisons keep their
        // direct rendering
        assert_eq!(filter_of(&model), doc! { "x": { "$gt": 3 } });
    }

    assert_eq!(translator.cache_stats(), CacheStats::default());
}

#[test]
fn counters_accumulate_across_translations() {
    let before = metrics_report();
    let translator = cached_translator();

    translate_with(&translator, &customers_query().filter(|c| c.get("x").gt(3)));
    translate_with(&translator, &customers_query().filter(|c| c.get("x").gt(5)));
    translate_with(&translator, &customers_query().sum(|c| c.get("x")));
    let failed = translator.translate(&customers_query().flat_map(|c| c.get("tags")));
    assert!(failed.is_err());

    // counters are process-wide, so concurrent tests may add to them too;
    // only the lower bound of the delta is ours
    let after = metrics_report();
    assert!(after.translations - before.translations >= 3);
    assert!(after.find_models - before.find_models >= 2);
    assert!(after.pipeline_models - before.pipeline_models >= 1);
    assert!(after.cache_hits - before.cache_hits >= 1);
    assert!(after.cache_misses - before.cache_misses >= 3);
    assert!(after.failures - before.failures >= 1);
}

struct RecordingSink {
    events: Mutex<Vec<TranslateTraceEvent>>,
}

impl TranslateTraceSink for RecordingSink {
    fn on_event(&self, event: TranslateTraceEvent) {
        self.events
            .lock()
            .expect("sink lock should not be poisoned")
            .push(event);
    }
}

static SINK: RecordingSink = RecordingSink {
    events: Mutex::new(Vec::new()),
};

#[test]
fn trace_events_narrate_the_translation() {
    let translator = cached_translator().with_trace_sink(&SINK);

    translate_with(&translator, &customers_query().filter(|c| c.get("x").gt(3)));
    translate_with(&translator, &customers_query().filter(|c| c.get("x").gt(5)));
    let failed = translator.translate(&customers_query().flat_map(|c| c.get("tags")));
    assert!(failed.is_err());

    let events = SINK
        .events
        .lock()
        .expect("sink lock should not be poisoned")
        .clone();
    assert_eq!(events.len(), 6);

    let TranslateTraceEvent::CacheMiss { fingerprint: filter_fp } = events[0] else {
        panic!("expected a cache miss first, got {:?}", events[0]);
    };
    assert_eq!(
        events[1],
        TranslateTraceEvent::Translated {
            fingerprint: Some(filter_fp),
            form: TraceForm::Find,
        }
    );
    assert_eq!(
        events[2],
        TranslateTraceEvent::CacheHit {
            fingerprint: filter_fp,
        }
    );
    assert_eq!(
        events[3],
        TranslateTraceEvent::Translated {
            fingerprint: Some(filter_fp),
            form: TraceForm::Find,
        }
    );
    let TranslateTraceEvent::CacheMiss { fingerprint: failed_fp } = events[4] else {
        panic!("expected a cache miss before the failure, got {:?}", events[4]);
    };
    assert_ne!(failed_fp, filter_fp);
    assert_eq!(
        events[5],
        TranslateTraceEvent::Failed {
            fingerprint: Some(failed_fp),
            failure: TraceFailure::Unsupported,
        }
    );
}
