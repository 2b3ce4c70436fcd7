//! Decode errors

use thiserror::Error;

/// A structural or format problem in a dump stream
///
/// Every variant carries the approximate byte offset in the decompressed
/// stream at which the problem was detected. Decode errors are terminal:
/// the reader yields nothing further once one has been returned.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed markup near byte {offset}: {source}")]
    Xml {
        offset: u64,
        #[source]
        source: quick_xml::Error,
    },

    #[error("unexpected element <{found}> near byte {offset}, expected <{expected}>")]
    UnexpectedElement {
        expected: String,
        found: String,
        offset: u64,
    },

    #[error("element <{child}> nested inside text element <{element}> near byte {offset}")]
    UnexpectedNesting {
        element: String,
        child: String,
        offset: u64,
    },

    #[error("input ended inside <{element}> near byte {offset}")]
    UnexpectedEof { element: String, offset: u64 },

    #[error("invalid integer {value:?} for {field} near byte {offset}: {reason}")]
    InvalidNumber {
        field: String,
        value: String,
        reason: String,
        offset: u64,
    },

    #[error("invalid boolean {value:?} for {field} near byte {offset}")]
    InvalidBoolean {
        field: String,
        value: String,
        offset: u64,
    },

    #[error("<{record}> near byte {offset} has no {field}")]
    MissingField {
        record: &'static str,
        field: &'static str,
        offset: u64,
    },

    #[error("collection <{collection}> near byte {offset} exceeds the ordinal range")]
    CollectionTooLarge { collection: String, offset: u64 },

    #[error("invalid UTF-8 text near byte {offset}")]
    Encoding { offset: u64 },
}

impl DecodeError {
    /// Approximate byte offset of the failure in the input stream
    pub fn offset(&self) -> u64 {
        match self {
            DecodeError::Xml { offset, .. }
            | DecodeError::UnexpectedElement { offset, .. }
            | DecodeError::UnexpectedNesting { offset, .. }
            | DecodeError::UnexpectedEof { offset, .. }
            | DecodeError::InvalidNumber { offset, .. }
            | DecodeError::InvalidBoolean { offset, .. }
            | DecodeError::MissingField { offset, .. }
            | DecodeError::CollectionTooLarge { offset, .. }
            | DecodeError::Encoding { offset } => *offset,
        }
    }
}

/// Result type for decode operations
pub type Result<T> = std::result::Result<T, DecodeError>;
