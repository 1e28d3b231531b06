//! # Error Types
//!
//! This module defines the error types used throughout the library.
//! All operations return [`Result<T, NusError>`](NusError).

use std::fmt;
use thiserror::Error;

/// Which integrity check produced a [`NusError::ChecksumMismatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashLevel {
    /// SHA1 over the whole decrypted content.
    Content,
    /// SHA1 over the externally supplied H3 array.
    H3Table,
    /// SHA1 of one block's decrypted payload.
    H0,
    /// SHA1 over sixteen H0 slots.
    H1,
    /// SHA1 over sixteen H1 slots.
    H2,
    /// SHA1 over sixteen H2 slots, checked against the H3 array.
    H3,
}

impl fmt::Display for HashLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HashLevel::Content => "content",
            HashLevel::H3Table => "H3 table",
            HashLevel::H0 => "H0",
            HashLevel::H1 => "H1",
            HashLevel::H2 => "H2",
            HashLevel::H3 => "H3",
        };
        f.write_str(name)
    }
}

/// The error type for all content decryption and verification operations.
#[derive(Error, Debug)]
pub enum NusError {
    /// I/O error from the raw source or the output sink.
    ///
    /// A broken pipe on the sink is never reported through this variant; it
    /// ends the operation early and successfully.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A computed hash did not match the expected one.
    ///
    /// Raised for whole-content SHA1, the H3 table and every hash-tree level.
    /// Contents flagged as tolerant log the mismatch instead.
    #[error("checksum mismatch ({level}{}): computed {computed}, expected {expected}",
        .block.map(|b| format!(", block {b}")).unwrap_or_default())]
    ChecksumMismatch {
        level: HashLevel,
        block: Option<u64>,
        computed: String,
        expected: String,
    },

    /// A hashed block could not be read in full.
    #[error("short read: expected {expected} bytes, got {got}")]
    ShortRead { expected: usize, got: usize },

    /// H3 hashes required for verification are absent or incomplete.
    #[error("missing hash material: {0}")]
    MissingHashMaterial(String),

    /// A cipher operation was given a buffer that is not a multiple of 16.
    #[error("buffer length {0} is not a multiple of the AES block size")]
    Alignment(usize),

    /// A descriptor record (TMD content record, ticket field) is malformed.
    #[error("format error: {0}")]
    Format(String),

    /// The pull-mode worker terminated without producing a result.
    #[error("content worker thread panicked")]
    WorkerPanicked,
}

impl NusError {
    /// Build a [`NusError::ChecksumMismatch`] from raw digests.
    pub fn checksum(level: HashLevel, block: Option<u64>, computed: &[u8], expected: &[u8]) -> Self {
        NusError::ChecksumMismatch {
            level,
            block,
            computed: hex::encode(computed),
            expected: hex::encode(expected),
        }
    }

    /// `true` for errors a tolerant content is allowed to ignore.
    pub fn is_checksum_mismatch(&self) -> bool {
        matches!(self, NusError::ChecksumMismatch { .. })
    }
}

impl From<NusError> for std::io::Error {
    fn from(err: NusError) -> Self {
        match err {
            NusError::Io(e) => e,
            other => std::io::Error::other(other),
        }
    }
}
