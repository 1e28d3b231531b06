// src/lib.rs

//! Streaming, range-addressable decryption of NUS title contents.
//!
//! Contents are AES-128-CBC encrypted under a per-title key, either as one
//! CBC stream (non-hashed) or as independent `0x10000`-byte blocks each
//! carrying a slice of an H0–H3 SHA1 tree (hashed). Any byte window of a
//! content can be decrypted without touching the rest, and integrity is
//! checked along the way.

pub mod aliases;
#[cfg(feature = "batch-ops")]
pub mod batch_ops;
pub mod builders;
pub mod consts;
pub mod content;
pub mod crypto;
pub mod decryptor;
pub mod encryptor;
pub mod error;
pub mod processor;
pub mod source;
pub mod stream;
pub mod title;
pub mod utils;

// High-level API
pub use builders::ProcessorBuilder;
pub use content::{parse_content_records, Content, ContentFlags};
pub use error::{HashLevel, NusError};
pub use processor::{ContentProcessor, ContentReader, ProcessorConfig};
pub use source::{DirectorySource, MemorySource, RawSource, RawStream};
pub use title::TitleKey;

// Encryption mirror, for re-packaging and fixtures
pub use encryptor::{encrypt_hashed, encrypt_non_hashed, ContentDigest, HashTree, HashedDigest};

#[cfg(feature = "batch-ops")]
pub use batch_ops::decrypt_batch;
