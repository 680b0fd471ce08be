//! Parse failures for prefixed numeric ids.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    #[error("empty id")]
    Empty,

    /// No `_` between kind and number.
    #[error("malformed id {input:?}: expected <kind>_<number>")]
    MissingSeparator { input: String },

    /// Well-formed, but an id of another kind.
    #[error("expected a {expected} id, got a {actual} id")]
    WrongKind {
        expected: &'static str,
        actual: String,
    },

    /// Signs, leading zeros and non-digits are not accepted.
    #[error("non-canonical id number {0:?}")]
    NotCanonical(String),

    #[error("id number {0} does not fit in 64 bits")]
    Overflow(String),
}

impl IdError {
    pub fn is_empty(&self) -> bool {
        matches!(self, IdError::Empty)
    }

    /// True when the input names a different id kind.
    pub fn is_wrong_kind(&self) -> bool {
        matches!(self, IdError::WrongKind { .. })
    }
}
