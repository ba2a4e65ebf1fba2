//! Module: exec::model
//! Responsibility: rendered execution models and how they run.
//! Does not own: the store; models execute against any `Collection`.
//! Boundary: a model is inert data. Translating and executing the same
//! model twice performs the same store operations twice.

use crate::{
    error::ExecuteError,
    ir::{Aggregator, CountWidth, Projector},
};

use super::{Collection, FindOptions, Output};
use bson::{Bson, Document};

///
/// Model
///
/// A translated query in executable form. Find is the preferred rendering;
/// a pipeline is used when the chain has no find form.
///

#[derive(Clone, Debug, PartialEq)]
pub enum Model {
    Find(FindModel),
    Pipeline(PipelineModel),
}

impl Model {
    #[must_use]
    pub fn collection(&self) -> &str {
        match self {
            Self::Find(model) => &model.collection,
            Self::Pipeline(model) => &model.collection,
        }
    }

    #[must_use]
    pub fn document_type(&self) -> &str {
        match self {
            Self::Find(model) => &model.document_type,
            Self::Pipeline(model) => &model.document_type,
        }
    }

    #[must_use]
    pub const fn projector(&self) -> &Projector {
        match self {
            Self::Find(model) => &model.projector,
            Self::Pipeline(model) => &model.projector,
        }
    }

    /// The server-side field selection, when this form carries one. A
    /// pipeline's selection lives in its `$project` stages instead.
    #[must_use]
    pub const fn projection(&self) -> Option<&Document> {
        match self {
            Self::Find(model) => model.projection.as_ref(),
            Self::Pipeline(_) => None,
        }
    }

    #[must_use]
    pub const fn aggregator(&self) -> Option<&Aggregator> {
        match self {
            Self::Find(model) => model.aggregator.as_ref(),
            Self::Pipeline(model) => model.aggregator.as_ref(),
        }
    }

    /// Run the model against a collection.
    pub fn execute(&self, collection: &dyn Collection) -> Result<Output, ExecuteError> {
        match self {
            Self::Find(model) => model.execute(collection),
            Self::Pipeline(model) => model.execute(collection),
        }
    }
}

///
/// FindModel
///
/// A query rendered as a single find, count or distinct call, with the
/// client-side shaping that completes it.
///

#[derive(Clone, Debug, PartialEq)]
pub struct FindModel {
    pub collection: String,
    pub document_type: String,
    pub filter: Document,
    pub projection: Option<Document>,
    pub sort: Option<Document>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
    pub distinct_field: Option<String>,
    pub count: Option<CountWidth>,
    pub projector: Projector,
    pub aggregator: Option<Aggregator>,
}

impl FindModel {
    pub fn execute(&self, collection: &dyn Collection) -> Result<Output, ExecuteError> {
        if let Some(width) = self.count {
            let count = collection.count(&self.filter, self.skip, self.limit)?;
            return Ok(Output::One(width.render_unsigned(count)?));
        }
        if let Some(field) = &self.distinct_field {
            let values = collection.distinct(field, &self.filter)?;
            return Ok(Output::Many(values));
        }
        let rows = collection.find(&self.options())?;
        let values: Vec<Bson> = rows.iter().map(|row| self.projector.apply(row)).collect();
        match &self.aggregator {
            Some(aggregator) => Ok(Output::One(aggregator.apply(values)?)),
            None => Ok(Output::Many(values)),
        }
    }

    #[must_use]
    pub fn options(&self) -> FindOptions {
        FindOptions {
            filter: self.filter.clone(),
            projection: self.projection.clone(),
            sort: self.sort.clone(),
            skip: self.skip,
            limit: self.limit,
        }
    }
}

///
/// PipelineModel
///
/// A query rendered as an aggregation pipeline.
///

#[derive(Clone, Debug, PartialEq)]
pub struct PipelineModel {
    pub collection: String,
    pub document_type: String,
    pub stages: Vec<Document>,
    pub projector: Projector,
    pub aggregator: Option<Aggregator>,
}

impl PipelineModel {
    pub fn execute(&self, collection: &dyn Collection) -> Result<Output, ExecuteError> {
        let rows = collection.aggregate(&self.stages)?;
        let values: Vec<Bson> = rows.iter().map(|row| self.projector.apply(row)).collect();
        match &self.aggregator {
            Some(aggregator) => Ok(Output::One(aggregator.apply(values)?)),
            None => Ok(Output::Many(values)),
        }
    }
}
