use crate::lower::ExecutionTarget;
use thiserror::Error as ThisError;

///
/// UnsupportedQuery
///
/// Single refusal taxonomy for every construct the translator cannot express
/// against the backend. Raised the moment an unsupported shape is recognized,
/// always naming the offending operator, overload, or member.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
#[error("unsupported query: {reason}")]
pub struct UnsupportedQuery {
    pub reason: String,
}

impl UnsupportedQuery {
    pub(crate) fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// A sequence operator that is recognized but never translated.
    pub(crate) fn operator(name: &str) -> Self {
        Self::new(format!("the {name} operator is not supported"))
    }

    /// A supported operator invoked through an untranslatable overload.
    pub(crate) fn overload(name: &str, detail: &str) -> Self {
        Self::new(format!(
            "the {name} overload taking {detail} is not supported"
        ))
    }

    /// Member access that has no field mapping or operator rendering.
    pub(crate) fn member(name: &str, on: &str) -> Self {
        Self::new(format!("the member {name} is not supported on {on}"))
    }

    /// An expression shape no translator rule matches.
    pub(crate) fn expression(detail: impl Into<String>) -> Self {
        Self::new(detail)
    }
}

///
/// CatalogError
///
/// Schema catalog resolution failures. Unknown document types and unmapped
/// fields are surfaced before any translation work begins.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum CatalogError {
    #[error("unknown document type: {name}")]
    UnknownDocumentType { name: String },

    #[error("document type {document_type} has no field mapping for {member}")]
    UnknownField {
        document_type: String,
        member: String,
    },
}

///
/// TranslateError
///
/// Top-level failure surface of `Translator::translate`. Unsupported shapes
/// carry the capability mask that was attempted so callers can tell a
/// find-form refusal from a total one.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum TranslateError {
    #[error("no execution form for {targets}: {source}")]
    Unsupported {
        targets: ExecutionTarget,
        source: UnsupportedQuery,
    },

    #[error(transparent)]
    Schema(#[from] CatalogError),
}

impl TranslateError {
    #[must_use]
    pub(crate) const fn unsupported(targets: ExecutionTarget, source: UnsupportedQuery) -> Self {
        Self::Unsupported { targets, source }
    }
}

///
/// StoreError
///
/// Opaque backend failure reported by a `Collection` implementation. The
/// translator never inspects the message; it is carried through verbatim.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
#[error("collection store failure: {message}")]
pub struct StoreError {
    pub message: String,
}

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

///
/// SequenceError
///
/// Cardinality failures raised by client-side aggregators over the rows a
/// backend returned.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, ThisError)]
pub enum SequenceError {
    #[error("sequence contains no elements")]
    NoElements,

    #[error("sequence contains more than one element")]
    MoreThanOne,
}

///
/// ExecuteError
///
/// Failure surface of model execution against a `Collection`.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum ExecuteError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("count result {count} exceeds the {width} range")]
    CountOverflow { count: u64, width: &'static str },

    #[error(transparent)]
    Sequence(#[from] SequenceError),

    #[error("aggregation returned a non-numeric count: {found}")]
    NonNumericCount { found: String },
}
