//! Module: schema
//! Responsibility: document-type metadata the binder resolves members against.
//! Does not own: expression binding or operator rendering.
//! Boundary: catalog lookups return `FieldBinding`s; everything downstream
//! works on those, never on raw member names.

mod catalog;
mod codec;

pub use catalog::{DocumentMap, MappedCatalog};
pub use codec::Codec;

use crate::error::CatalogError;
use std::{fmt, sync::Arc};

///
/// SchemaCatalog
///
/// Member-to-field resolution for every document type a query may touch.
/// Implementations must be cheap to call; resolution happens once per member
/// access during binding.
///

pub trait SchemaCatalog: Send + Sync {
    /// Resolve a member of `document_type` to its stored field binding.
    fn resolve(&self, document_type: &str, member: &str) -> Result<FieldBinding, CatalogError>;
}

impl<T: SchemaCatalog + ?Sized> SchemaCatalog for Arc<T> {
    fn resolve(&self, document_type: &str, member: &str) -> Result<FieldBinding, CatalogError> {
        (**self).resolve(document_type, member)
    }
}

///
/// NominalType
///
/// The declared backend type of a stored field. Drives member-access
/// dispatch: date parts only bind on `Date`, nested members only on
/// `Document`, length only on `Array`.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum NominalType {
    /// No declared type; all accesses must be decidable without one.
    Any,
    Bool,
    Int32,
    Int64,
    Float64,
    Utf8,
    Date,
    /// Embedded document of the named type.
    Document(String),
    /// Array whose elements carry the inner type.
    Array(Box<NominalType>),
}

impl NominalType {
    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        matches!(self, Self::Int32 | Self::Int64 | Self::Float64)
    }

    #[must_use]
    pub const fn is_string(&self) -> bool {
        matches!(self, Self::Utf8)
    }

    #[must_use]
    pub const fn is_date(&self) -> bool {
        matches!(self, Self::Date)
    }

    #[must_use]
    pub const fn is_bool(&self) -> bool {
        matches!(self, Self::Bool)
    }

    /// Element type of an array field, if this is one.
    #[must_use]
    pub fn element(&self) -> Option<&Self> {
        match self {
            Self::Array(inner) => Some(inner),
            _ => None,
        }
    }

    /// Embedded document type name, if this is a document field.
    #[must_use]
    pub fn document_type(&self) -> Option<&str> {
        match self {
            Self::Document(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for NominalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "any"),
            Self::Bool => write!(f, "bool"),
            Self::Int32 => write!(f, "int32"),
            Self::Int64 => write!(f, "int64"),
            Self::Float64 => write!(f, "float64"),
            Self::Utf8 => write!(f, "utf8"),
            Self::Date => write!(f, "date"),
            Self::Document(name) => write!(f, "document<{name}>"),
            Self::Array(inner) => write!(f, "array<{inner}>"),
        }
    }
}

///
/// FieldBinding
///
/// Resolution of one member access: the stored element name, the declared
/// type, and the codec constants must pass through before rendering.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FieldBinding {
    /// Stored element name, which may differ from the member name.
    pub name: String,
    pub nominal: NominalType,
    pub codec: Codec,
}

impl FieldBinding {
    #[must_use]
    pub fn new(name: impl Into<String>, nominal: NominalType) -> Self {
        Self {
            name: name.into(),
            nominal,
            codec: Codec::Verbatim,
        }
    }

    #[must_use]
    pub fn with_codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }
}
