use crate::{
    error::CatalogError,
    schema::{Codec, FieldBinding, NominalType, SchemaCatalog},
};
use std::collections::HashMap;

///
/// MappedCatalog
///
/// In-process catalog built by explicit registration. Each document type maps
/// member names to stored field bindings; nested document types are
/// registered alongside their parents under their own names.
///

#[derive(Debug, Default)]
pub struct MappedCatalog {
    types: HashMap<String, DocumentMap>,
}

impl MappedCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn document(mut self, name: impl Into<String>, map: DocumentMap) -> Self {
        self.types.insert(name.into(), map);
        self
    }
}

impl SchemaCatalog for MappedCatalog {
    fn resolve(&self, document_type: &str, member: &str) -> Result<FieldBinding, CatalogError> {
        let map = self
            .types
            .get(document_type)
            .ok_or_else(|| CatalogError::UnknownDocumentType {
                name: document_type.to_string(),
            })?;

        map.fields
            .get(member)
            .cloned()
            .ok_or_else(|| CatalogError::UnknownField {
                document_type: document_type.to_string(),
                member: member.to_string(),
            })
    }
}

///
/// DocumentMap
///
/// Member bindings for one document type.
///

#[derive(Debug, Default)]
pub struct DocumentMap {
    fields: HashMap<String, FieldBinding>,
}

impl DocumentMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a member whose stored name matches the member name.
    #[must_use]
    pub fn field(self, member: &str, nominal: NominalType) -> Self {
        self.mapped_field(member, member, nominal)
    }

    /// Register a member stored under a different element name.
    #[must_use]
    pub fn mapped_field(mut self, member: &str, stored: &str, nominal: NominalType) -> Self {
        self.fields
            .insert(member.to_string(), FieldBinding::new(stored, nominal));
        self
    }

    /// Register a member whose comparison constants pass through a codec.
    #[must_use]
    pub fn coded_field(mut self, member: &str, nominal: NominalType, codec: Codec) -> Self {
        self.fields.insert(
            member.to_string(),
            FieldBinding::new(member, nominal).with_codec(codec),
        );
        self
    }
}
