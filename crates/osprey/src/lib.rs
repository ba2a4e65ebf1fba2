//! Facade over the Osprey runtime.
//!
//! ## Crate layout
//! - `core`: the typed query builder, the schema catalog, the translator,
//!   and the executable store models it produces.
//!
//! The `prelude` module mirrors the surface a query author needs; everything
//! else stays reachable through `core`.

pub use osprey_core as core;

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use osprey_core::{TranslateOptions, Translator};

///
/// Prelude
///

pub mod prelude {
    pub use crate::core::{
        error::{ExecuteError, TranslateError},
        exec::{Collection, Model, Output},
        lower::ExecutionTarget,
        schema::{Codec, DocumentMap, MappedCatalog, NominalType, SchemaCatalog},
        translator::{TranslateOptions, Translator},
        tree::{cond, lit, record, seq, Operand, Queryable},
    };
}

#[cfg(test)]
mod tests {
    use crate::prelude::*;
    use bson::doc;
    use std::sync::Arc;

    fn catalog() -> MappedCatalog {
        MappedCatalog::new().document(
            "Reading",
            DocumentMap::new()
                .field("sensor", NominalType::Utf8)
                .field("value", NominalType::Int32),
        )
    }

    #[test]
    fn the_prelude_carries_a_full_translation() {
        let translator = Translator::new(Arc::new(catalog()));
        let q = Queryable::collection("readings", "Reading")
            .filter(|r| r.get("value").gte(10))
            .sort_by(|r| r.get("sensor"))
            .take(3);
        let model = translator
            .translate(&q)
            .expect("translation should succeed");

        let Model::Find(find) = model else {
            panic!("expected a find model");
        };
        assert_eq!(find.collection, "readings");
        assert_eq!(find.filter, doc! { "value": { "$gte": 10 } });
        assert_eq!(find.sort, Some(doc! { "sensor": 1 }));
        assert_eq!(find.limit, Some(3));
    }

    #[test]
    fn the_version_is_exported() {
        assert!(!crate::VERSION.is_empty());
    }
}
