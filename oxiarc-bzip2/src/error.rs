//! Error kinds for the bzip2 engine.
//!
//! `BzError` wraps `oxiarc_core::OxiArcError` for I/O/framing failures
//! shared across codecs and adds the bzip2-specific kinds a caller needs to
//! distinguish: a handle used out of sequence, a bad parameter at
//! `init*` time, and the various ways a compressed stream can be corrupt.
//! The variant names and the situations they cover mirror libbzip2's own
//! `BZ_*` return codes (`BZ_SEQUENCE_ERROR`, `BZ_PARAM_ERROR`,
//! `BZ_MEM_ERROR`, `BZ_DATA_ERROR`, `BZ_DATA_ERROR_MAGIC`,
//! `BZ_UNEXPECTED_EOF`, `BZ_OUTBUFF_FULL`, `BZ_CONFIG_ERROR`).

use oxiarc_core::OxiArcError;
use thiserror::Error;

/// Errors produced by the bzip2 compressor/decompressor.
#[derive(Debug, Error)]
pub enum BzError {
    /// Wraps the shared I/O/framing error type.
    #[error(transparent)]
    Core(#[from] OxiArcError),

    /// A handle method was called out of the sequence its state machine
    /// requires (e.g. `feed` after `endCompress`).
    #[error("method called out of sequence for the handle's current state")]
    SequenceError,

    /// An `init*` call received an invalid parameter.
    #[error("invalid parameter: {detail}")]
    ParamError {
        /// What was invalid and why.
        detail: String,
    },

    /// Allocation failed building internal working buffers.
    #[error("memory allocation failed")]
    MemError,

    /// The compressed stream is structurally invalid.
    #[error("corrupt data: {detail}")]
    DataError {
        /// What was wrong with the stream.
        detail: String,
    },

    /// The stream's magic header did not match `BZh`.
    #[error("bad magic number: not a bzip2 stream")]
    DataErrorMagic,

    /// The stream ended before a complete unit could be parsed.
    #[error("unexpected end of stream")]
    UnexpectedEof,

    /// The caller's output buffer is full and no further progress is
    /// possible without the caller draining it first.
    #[error("output buffer is full")]
    OutbuffFull,

    /// The build/configuration of this crate cannot support the request
    /// (e.g. a word size assumption does not hold on this platform).
    #[error("unsupported configuration: {detail}")]
    ConfigError {
        /// Description of the unmet configuration requirement.
        detail: String,
    },
}

impl BzError {
    /// Build a [`BzError::DataError`] with a message.
    pub fn data_error(detail: impl Into<String>) -> Self {
        Self::DataError {
            detail: detail.into(),
        }
    }

    /// Build a [`BzError::ParamError`] with a message.
    pub fn param_error(detail: impl Into<String>) -> Self {
        Self::ParamError {
            detail: detail.into(),
        }
    }

    /// Build a [`BzError::ConfigError`] with a message.
    pub fn config_error(detail: impl Into<String>) -> Self {
        Self::ConfigError {
            detail: detail.into(),
        }
    }
}

/// Result type alias for bzip2 operations.
pub type Result<T> = std::result::Result<T, BzError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_error_display_includes_detail() {
        let err = BzError::data_error("bad block magic");
        assert!(err.to_string().contains("bad block magic"));
    }

    #[test]
    fn core_error_converts_via_from() {
        let core = OxiArcError::invalid_magic(vec![0x42, 0x5A], vec![0, 0]);
        let err: BzError = core.into();
        assert!(matches!(err, BzError::Core(_)));
    }
}
