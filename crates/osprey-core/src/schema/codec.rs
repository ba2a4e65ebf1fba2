use crate::error::UnsupportedQuery;
use bson::Bson;

///
/// Codec
///
/// Per-field constant encoding applied at translation time. A field whose
/// stored representation differs from its surface type declares the codec in
/// its binding; comparison constants are passed through `encode` before they
/// reach a rendered document. Cached translations record the codec tag next
/// to each parameter slot so substitution encodes late-bound constants the
/// same way.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Codec {
    /// Values are stored as-is.
    Verbatim,
    /// Integers are stored as their decimal string rendering.
    StringifiedInt64,
    /// Dates are stored as signed milliseconds since the Unix epoch.
    EpochMillis,
}

impl Codec {
    /// Stable tag recorded in cached parameter markers.
    #[must_use]
    pub const fn tag(self) -> i32 {
        match self {
            Self::Verbatim => 0,
            Self::StringifiedInt64 => 1,
            Self::EpochMillis => 2,
        }
    }

    #[must_use]
    pub const fn from_tag(tag: i32) -> Option<Self> {
        match tag {
            0 => Some(Self::Verbatim),
            1 => Some(Self::StringifiedInt64),
            2 => Some(Self::EpochMillis),
            _ => None,
        }
    }

    /// Encode one constant for storage comparison.
    pub fn encode(self, value: Bson) -> Result<Bson, UnsupportedQuery> {
        match self {
            Self::Verbatim => Ok(value),
            Self::StringifiedInt64 => match value {
                Bson::Int32(n) => Ok(Bson::String(n.to_string())),
                Bson::Int64(n) => Ok(Bson::String(n.to_string())),
                other => Err(Self::mismatch("stringified-int64", &other)),
            },
            Self::EpochMillis => match value {
                Bson::DateTime(dt) => Ok(Bson::Int64(dt.timestamp_millis())),
                Bson::Int64(n) => Ok(Bson::Int64(n)),
                other => Err(Self::mismatch("epoch-millis", &other)),
            },
        }
    }

    fn mismatch(codec: &str, value: &Bson) -> UnsupportedQuery {
        UnsupportedQuery::expression(format!(
            "a {:?} constant cannot be encoded through the {codec} field codec",
            value.element_type(),
        ))
    }
}
