// ============================================================
// Layer 3 - Packing Errors
// ============================================================
// The packer is the one part of the system that reports typed
// errors instead of anyhow strings, so callers can tell a bad
// configuration (caught at construction) apart from a bad
// record (caught mid-stream).

use std::convert::Infallible;

use thiserror::Error;

/// Errors raised by the window packer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PackError {
    /// The packer was built with an unusable configuration
    #[error("invalid packer configuration: {0}")]
    Configuration(String),

    /// A record carried a token id or mask bit that cannot be packed
    #[error("record {index} is malformed")]
    InvalidRecord {
        /// Zero-based position of the record in the input stream
        index: usize,
        #[source]
        source: InvalidToken,
    },
}

impl PackError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

/// What exactly was wrong inside a malformed record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidToken {
    #[error("token id {value} at position {position} is outside 0..=4294967295")]
    OutOfRange { position: usize, value: i128 },

    #[error("token id at position {position} is not an integer")]
    NotInteger { position: usize },

    #[error("mask bit {value} at position {position} is not 0 or 1")]
    MaskBit { position: usize, value: u8 },

    #[error("mask has {mask} bits but the record has {tokens} tokens")]
    MaskLength { tokens: usize, mask: usize },
}

// Lets infallible conversions (e.g. `Vec<u32>` into `Record`) feed the packer
impl From<Infallible> for InvalidToken {
    fn from(never: Infallible) -> Self {
        match never {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_invalid_record_exposes_source() {
        let err = PackError::InvalidRecord {
            index: 3,
            source: InvalidToken::OutOfRange { position: 1, value: -5 },
        };
        assert_eq!(err.to_string(), "record 3 is malformed");
        let source = err.source().unwrap().to_string();
        assert!(source.contains("-5"));
        assert!(source.contains("position 1"));
    }

    #[test]
    fn test_not_integer_message() {
        let err = InvalidToken::NotInteger { position: 4 };
        assert_eq!(err.to_string(), "token id at position 4 is not an integer");
    }

    #[test]
    fn test_configuration_message() {
        let err = PackError::configuration("token_limit must be > 0");
        assert_eq!(
            err.to_string(),
            "invalid packer configuration: token_limit must be > 0"
        );
    }
}
