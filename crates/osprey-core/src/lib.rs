//! Core runtime for Osprey: the typed query builder, the schema catalog,
//! and the translator that turns chains into executable store models.
#![warn(unreachable_pub)]

// public exports are one module level down
pub mod cache;
pub mod error;
pub mod exec;
pub mod ir;
pub mod lower;
pub mod obs;
pub mod schema;
pub mod translator;
pub mod tree;

// internal stages of the translation
mod bind;
mod rewrite;
mod translate;

// test
#[cfg(test)]
pub(crate) mod test_support;
#[cfg(test)]
mod tests;

pub use translator::{TranslateOptions, Translator};

///
/// Prelude
///
/// Prelude contains only what a query author needs: the builder
/// vocabulary, the catalog surface, and the translation entry points.
///

pub mod prelude {
    pub use crate::{
        error::{ExecuteError, TranslateError},
        exec::{Collection, Model, Output},
        lower::ExecutionTarget,
        schema::{Codec, DocumentMap, MappedCatalog, NominalType, SchemaCatalog},
        translator::{TranslateOptions, Translator},
        tree::{cond, lit, record, seq, Operand, Queryable},
    };
}
