//! Module: translator
//! Responsibility: the public translation entry point. Folds, caches,
//! binds, rewrites, lowers and substitutes in one call.
//! Does not own: execution; the produced model runs wherever the caller
//! points it.
//! Boundary: a translator is shared and immutable. Translation touches
//! nothing but its own cache and the process counters.

use crate::{
    bind::{self, BindError},
    cache::{
        param::{self, Parameterized},
        CacheStats, Fingerprint, TranslationCache,
    },
    error::{TranslateError, UnsupportedQuery},
    exec::Model,
    ir::{Aggregator, Projector},
    lower::{self, ExecutionTarget},
    obs::{
        metrics,
        trace::{TraceFailure, TraceForm, TranslateTraceEvent, TranslateTraceSink},
    },
    rewrite,
    schema::SchemaCatalog,
    tree::{fold, Expr, Queryable},
};
use bson::Bson;
use std::{fmt, sync::Arc};

///
/// TranslateOptions
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TranslateOptions {
    pub targets: ExecutionTarget,
    pub cache_capacity: usize,
}

impl Default for TranslateOptions {
    fn default() -> Self {
        Self {
            targets: ExecutionTarget::BEST_EFFORT,
            cache_capacity: 512,
        }
    }
}

impl TranslateOptions {
    #[must_use]
    pub const fn with_targets(mut self, targets: ExecutionTarget) -> Self {
        self.targets = targets;
        self
    }

    /// A capacity of zero disables caching and parameterization.
    #[must_use]
    pub const fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }
}

///
/// Translator
///
/// Translates query chains against one schema catalog. Cheap to share;
/// translation is lock-light and models are plain data.
///

pub struct Translator {
    catalog: Arc<dyn SchemaCatalog>,
    options: TranslateOptions,
    cache: TranslationCache,
    sink: Option<&'static dyn TranslateTraceSink>,
}

impl fmt::Debug for Translator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Translator")
            .field("options", &self.options)
            .field("cache", &self.cache.stats())
            .finish_non_exhaustive()
    }
}

impl Translator {
    #[must_use]
    pub fn new(catalog: Arc<dyn SchemaCatalog>) -> Self {
        Self::with_options(catalog, TranslateOptions::default())
    }

    #[must_use]
    pub fn with_options(catalog: Arc<dyn SchemaCatalog>, options: TranslateOptions) -> Self {
        Self {
            catalog,
            options,
            cache: TranslationCache::new(options.cache_capacity),
            sink: None,
        }
    }

    #[must_use]
    pub fn with_trace_sink(mut self, sink: &'static dyn TranslateTraceSink) -> Self {
        self.sink = Some(sink);
        self
    }

    #[must_use]
    pub const fn options(&self) -> &TranslateOptions {
        &self.options
    }

    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Translate a built chain.
    pub fn translate(&self, query: &Queryable) -> Result<Model, TranslateError> {
        self.translate_expr(query.expr())
    }

    /// Translate a raw input tree.
    pub fn translate_expr(&self, expr: &Expr) -> Result<Model, TranslateError> {
        let folded = fold(expr.clone());

        let (result, fingerprint) = if self.options.cache_capacity == 0 {
            (self.translate_tree(&folded), None)
        } else {
            let Parameterized { template, slots } = param::parameterize(&folded);
            let fingerprint = Fingerprint::of(&template, self.options.targets);
            (
                self.translate_template(fingerprint, &template, &slots),
                Some(fingerprint),
            )
        };

        match &result {
            Ok(model) => {
                let form = match model {
                    Model::Find(_) => {
                        metrics::record_find_model();
                        TraceForm::Find
                    }
                    Model::Pipeline(_) => {
                        metrics::record_pipeline_model();
                        TraceForm::Pipeline
                    }
                };
                self.emit(TranslateTraceEvent::Translated { fingerprint, form });
            }
            Err(error) => {
                metrics::record_failure();
                let failure = match error {
                    TranslateError::Unsupported { .. } => TraceFailure::Unsupported,
                    TranslateError::Schema(_) => TraceFailure::Schema,
                };
                self.emit(TranslateTraceEvent::Failed {
                    fingerprint,
                    failure,
                });
            }
        }
        result
    }

    fn translate_template(
        &self,
        fingerprint: Fingerprint,
        template: &Expr,
        slots: &[Bson],
    ) -> Result<Model, TranslateError> {
        if let Some(cached) = self.cache.get(&fingerprint) {
            metrics::record_cache_hit();
            self.emit(TranslateTraceEvent::CacheHit { fingerprint });
            return self.substitute(&cached, slots);
        }
        metrics::record_cache_miss();
        self.emit(TranslateTraceEvent::CacheMiss { fingerprint });

        // failed translations are not cached; they are cheap to reproduce
        // and keeping them out leaves the cache full of usable templates
        let template_model = Arc::new(self.translate_tree(template)?);
        self.cache.insert(fingerprint, Arc::clone(&template_model));
        self.substitute(&template_model, slots)
    }

    fn translate_tree(&self, expr: &Expr) -> Result<Model, TranslateError> {
        let node = bind::bind(self.catalog.as_ref(), expr).map_err(|error| match error {
            BindError::Unsupported(reason) => {
                TranslateError::unsupported(self.options.targets, reason)
            }
            BindError::Catalog(error) => TranslateError::Schema(error),
        })?;
        let node = rewrite::rewrite(node)
            .map_err(|reason| TranslateError::unsupported(self.options.targets, reason))?;
        lower::lower(&node, self.options.targets)
    }

    fn substitute(&self, model: &Model, slots: &[Bson]) -> Result<Model, TranslateError> {
        if slots.is_empty() {
            return Ok(model.clone());
        }
        let wrap = |reason| TranslateError::unsupported(self.options.targets, reason);
        match model {
            Model::Find(find) => {
                let mut filled = find.clone();
                filled.filter = param::fill_document(&find.filter, slots).map_err(wrap)?;
                filled.projector = fill_projector(&find.projector, slots).map_err(wrap)?;
                filled.aggregator =
                    fill_aggregator(find.aggregator.as_ref(), slots).map_err(wrap)?;
                Ok(Model::Find(filled))
            }
            Model::Pipeline(pipeline) => {
                let mut filled = pipeline.clone();
                filled.stages = pipeline
                    .stages
                    .iter()
                    .map(|stage| param::fill_document(stage, slots))
                    .collect::<Result<_, _>>()
                    .map_err(wrap)?;
                filled.projector = fill_projector(&pipeline.projector, slots).map_err(wrap)?;
                filled.aggregator =
                    fill_aggregator(pipeline.aggregator.as_ref(), slots).map_err(wrap)?;
                Ok(Model::Pipeline(filled))
            }
        }
    }

    fn emit(&self, event: TranslateTraceEvent) {
        if let Some(sink) = self.sink {
            sink.on_event(event);
        }
    }
}

fn fill_projector(
    projector: &Projector,
    slots: &[Bson],
) -> Result<Projector, UnsupportedQuery> {
    Ok(match projector {
        Projector::Identity => Projector::Identity,
        Projector::Field(path) => Projector::Field(path.clone()),
        Projector::Constant(value) => Projector::Constant(param::fill_value(value, slots)?),
        Projector::Record(entries) => {
            let mut filled = Vec::with_capacity(entries.len());
            for (name, entry) in entries {
                filled.push((name.clone(), fill_projector(entry, slots)?));
            }
            Projector::Record(filled)
        }
    })
}

fn fill_aggregator(
    aggregator: Option<&Aggregator>,
    slots: &[Bson],
) -> Result<Option<Aggregator>, UnsupportedQuery> {
    Ok(match aggregator {
        Some(Aggregator::FirstOr(value)) => {
            Some(Aggregator::FirstOr(param::fill_value(value, slots)?))
        }
        other => other.cloned(),
    })
}
