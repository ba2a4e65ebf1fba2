//! Translator tracing boundary.
//!
//! Tracing is optional, injected by the caller, and must not affect
//! translation semantics.

use crate::cache::Fingerprint;

///
/// TranslateTraceSink
///

pub trait TranslateTraceSink: Send + Sync {
    fn on_event(&self, event: TranslateTraceEvent);
}

///
/// TraceForm
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TraceForm {
    Find,
    Pipeline,
}

///
/// TraceFailure
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TraceFailure {
    /// The chain has no execution form under the enabled targets.
    Unsupported,
    /// A document type or member was not in the catalog.
    Schema,
}

///
/// TranslateTraceEvent
///
/// Fingerprints are absent when caching is disabled; nothing was
/// parameterized, so there is no template to identify.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TranslateTraceEvent {
    CacheHit {
        fingerprint: Fingerprint,
    },
    CacheMiss {
        fingerprint: Fingerprint,
    },
    Translated {
        fingerprint: Option<Fingerprint>,
        form: TraceForm,
    },
    Failed {
        fingerprint: Option<Fingerprint>,
        failure: TraceFailure,
    },
}
