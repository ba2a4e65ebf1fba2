//! Observability: runtime telemetry (metrics) and trace abstractions.
//!
//! This module never reaches into translation internals. The translator
//! reports; this module only counts and forwards.

pub(crate) mod metrics;
pub(crate) mod trace;

// re-exports
pub use metrics::{metrics_report, metrics_reset, TranslatorReport};
pub use trace::{TraceFailure, TraceForm, TranslateTraceEvent, TranslateTraceSink};
