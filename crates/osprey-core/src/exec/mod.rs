//! Module: exec
//! Responsibility: the executable form of a translated query and the store
//! surface it runs against.
//! Does not own: translation; models arrive fully rendered from `lower`.
//! Boundary: everything here is store-agnostic. A `Collection` can be a
//! driver handle or an in-memory table; the models cannot tell.

mod model;

pub use model::{FindModel, Model, PipelineModel};

use crate::error::StoreError;
use bson::{Bson, Document};

///
/// FindOptions
///
/// The wire options of a find-form execution.
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FindOptions {
    pub filter: Document,
    pub projection: Option<Document>,
    pub sort: Option<Document>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

///
/// Collection
///
/// One queryable collection of documents. Implementations bridge to a real
/// driver; tests bridge to an in-memory table.
///

pub trait Collection {
    /// Run a find and return the matching documents in result order.
    fn find(&self, options: &FindOptions) -> Result<Vec<Document>, StoreError>;

    /// Count the documents matching `filter`, after `skip` and capped at
    /// `limit` when given.
    fn count(
        &self,
        filter: &Document,
        skip: Option<u64>,
        limit: Option<u64>,
    ) -> Result<u64, StoreError>;

    /// Distinct values of `field` across the documents matching `filter`.
    fn distinct(&self, field: &str, filter: &Document) -> Result<Vec<Bson>, StoreError>;

    /// Run an aggregation pipeline.
    fn aggregate(&self, stages: &[Document]) -> Result<Vec<Document>, StoreError>;
}

///
/// Output
///
/// What an execution produced: a sequence of shaped values, or the single
/// value of a terminal operator.
///

#[derive(Clone, Debug, PartialEq)]
pub enum Output {
    Many(Vec<Bson>),
    One(Bson),
}

impl Output {
    /// The sequence form, treating a single value as a one-element sequence.
    #[must_use]
    pub fn into_values(self) -> Vec<Bson> {
        match self {
            Self::Many(values) => values,
            Self::One(value) => vec![value],
        }
    }

    /// The single value of a terminal execution, if this is one.
    #[must_use]
    pub fn into_single(self) -> Option<Bson> {
        match self {
            Self::One(value) => Some(value),
            Self::Many(_) => None,
        }
    }
}
