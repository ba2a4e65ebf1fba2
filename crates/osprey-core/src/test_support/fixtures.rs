//! Shared customer fixture: one catalog, one document set, builders for
//! translators over them. Scenario tests lean on the exact values here,
//! so extend the set rather than editing rows.

use crate::{
    schema::{Codec, DocumentMap, MappedCatalog, NominalType},
    test_support::store::InMemoryCollection,
    translator::{TranslateOptions, Translator},
    tree::Queryable,
};
use bson::{doc, Bson, DateTime, Document};
use std::sync::Arc;

// epoch millis for the timestamps below, all midnight UTC
pub(crate) const TS_2022_11_05: i64 = 1_667_606_400_000;
pub(crate) const TS_2023_01_15: i64 = 1_673_740_800_000;
pub(crate) const TS_2023_06_01: i64 = 1_685_577_600_000;
pub(crate) const TS_2024_03_10: i64 = 1_710_028_800_000;

///
/// customer_catalog
///
/// `Customer` with a nested `Dims` document under the stored name `d`.
/// Member names and stored names differ for `dims` to keep the mapping
/// path exercised.
///

pub(crate) fn customer_catalog() -> MappedCatalog {
    MappedCatalog::new()
        .document(
            "Customer",
            DocumentMap::new()
                .field("x", NominalType::Int32)
                .field("a", NominalType::Int32)
                .field("b", NominalType::Bool)
                .field("s", NominalType::Utf8)
                .mapped_field("dims", "d", NominalType::Document("Dims".to_string()))
                .field("ts", NominalType::Date)
                .field("tags", NominalType::Array(Box::new(NominalType::Utf8)))
                .coded_field("code", NominalType::Int64, Codec::StringifiedInt64),
        )
        .document(
            "Dims",
            DocumentMap::new()
                .field("z", NominalType::Int32)
                .field("w", NominalType::Int32),
        )
}

pub(crate) fn customers() -> Vec<Document> {
    vec![
        doc! {
            "x": 1, "a": 10, "b": true, "s": "alpha",
            "d": { "z": 1, "w": 9 },
            "ts": DateTime::from_millis(TS_2023_01_15),
            "tags": ["red", "blue"],
            "code": "100",
        },
        doc! {
            "x": 5, "a": 20, "b": false, "s": "Beta",
            "d": { "z": 2, "w": 8 },
            "ts": DateTime::from_millis(TS_2023_06_01),
            "tags": ["blue"],
            "code": "200",
        },
        doc! {
            "x": 2, "a": 10, "b": false, "s": "gamma",
            "d": { "z": 3, "w": 7 },
            "ts": DateTime::from_millis(TS_2024_03_10),
            "tags": ["green", "red"],
            "code": "100",
        },
        doc! {
            "x": 8, "a": 30, "b": false, "s": "delta",
            "d": { "z": 4, "w": 6 },
            "ts": DateTime::from_millis(TS_2022_11_05),
            "tags": [],
            "code": "300",
        },
        doc! {
            "x": 3, "a": 20, "b": false, "s": "alef",
            "d": { "z": 5, "w": 5 },
            "ts": DateTime::from_millis(TS_2023_01_15),
            "tags": ["red"],
            "code": "200",
        },
    ]
}

pub(crate) fn customer_store() -> InMemoryCollection {
    InMemoryCollection::new(customers())
}

pub(crate) fn customers_query() -> Queryable {
    Queryable::collection("customers", "Customer")
}

pub(crate) fn translator() -> Translator {
    Translator::new(Arc::new(customer_catalog()))
}

pub(crate) fn translator_with(options: TranslateOptions) -> Translator {
    Translator::with_options(Arc::new(customer_catalog()), options)
}

/// Translator with caching and parameterization disabled; renders constants
/// inline, which keeps shape assertions readable.
pub(crate) fn uncached_translator() -> Translator {
    translator_with(TranslateOptions::default().with_cache_capacity(0))
}

/// The `x` column of a result set, for order assertions.
pub(crate) fn xs(rows: &[Bson]) -> Vec<i32> {
    rows.iter()
        .filter_map(|row| match row {
            Bson::Document(doc) => doc.get_i32("x").ok(),
            Bson::Int32(n) => Some(*n),
            _ => None,
        })
        .collect()
}
