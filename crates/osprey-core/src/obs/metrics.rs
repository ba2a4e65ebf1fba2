//! Ephemeral, in-memory counters for translator activity.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

static TRANSLATIONS: AtomicU64 = AtomicU64::new(0);
static FIND_MODELS: AtomicU64 = AtomicU64::new(0);
static PIPELINE_MODELS: AtomicU64 = AtomicU64::new(0);
static CACHE_HITS: AtomicU64 = AtomicU64::new(0);
static CACHE_MISSES: AtomicU64 = AtomicU64::new(0);
static FAILURES: AtomicU64 = AtomicU64::new(0);

///
/// TranslatorReport
///
/// Point-in-time totals across every translator in the process.
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct TranslatorReport {
    pub translations: u64,
    pub find_models: u64,
    pub pipeline_models: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub failures: u64,
}

#[must_use]
pub fn metrics_report() -> TranslatorReport {
    TranslatorReport {
        translations: TRANSLATIONS.load(Ordering::Relaxed),
        find_models: FIND_MODELS.load(Ordering::Relaxed),
        pipeline_models: PIPELINE_MODELS.load(Ordering::Relaxed),
        cache_hits: CACHE_HITS.load(Ordering::Relaxed),
        cache_misses: CACHE_MISSES.load(Ordering::Relaxed),
        failures: FAILURES.load(Ordering::Relaxed),
    }
}

pub fn metrics_reset() {
    TRANSLATIONS.store(0, Ordering::Relaxed);
    FIND_MODELS.store(0, Ordering::Relaxed);
    PIPELINE_MODELS.store(0, Ordering::Relaxed);
    CACHE_HITS.store(0, Ordering::Relaxed);
    CACHE_MISSES.store(0, Ordering::Relaxed);
    FAILURES.store(0, Ordering::Relaxed);
}

pub(crate) fn record_find_model() {
    TRANSLATIONS.fetch_add(1, Ordering::Relaxed);
    FIND_MODELS.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_pipeline_model() {
    TRANSLATIONS.fetch_add(1, Ordering::Relaxed);
    PIPELINE_MODELS.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_cache_hit() {
    CACHE_HITS.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_cache_miss() {
    CACHE_MISSES.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_failure() {
    FAILURES.fetch_add(1, Ordering::Relaxed);
}
