//! src/builders/processor_builder.rs
//! Fluent configuration of a [`ContentProcessor`].

use crate::consts::AES_BLOCK_SIZE;
use crate::processor::{ContentProcessor, ProcessorConfig};
use crate::source::RawSource;
use crate::title::TitleKey;
use crate::utils::align_to_block;
use std::sync::Arc;

/// Builder for [`ContentProcessor`].
///
/// Defaults: verification on, absent H3 arrays tolerated with a warning,
/// `0x8000`-byte chunks, `0x10000`-byte pipe buffer.
///
/// # Example
///
/// ```
/// use nuscrypt_rs::{MemorySource, ProcessorBuilder, TitleKey};
///
/// let processor = ProcessorBuilder::new()
///     .with_required_h3(true)
///     .with_chunk_size(0x10000)
///     .build(MemorySource::new(), TitleKey::new([0u8; 16], 1));
/// assert!(processor.config().require_h3);
/// assert_eq!(processor.config().chunk_size, 0x10000);
/// ```
#[derive(Debug, Clone)]
pub struct ProcessorBuilder {
    config: ProcessorConfig,
}

impl ProcessorBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: ProcessorConfig::default(),
        }
    }

    /// Turn hash verification on or off.
    #[must_use]
    pub fn with_verification(mut self, verify: bool) -> Self {
        self.config.verify_hashes = verify;
        self
    }

    /// Fail with `MissingHashMaterial` when a hashed content has no H3 array.
    #[must_use]
    pub fn with_required_h3(mut self, required: bool) -> Self {
        self.config.require_h3 = required;
        self
    }

    /// Non-hashed chunk size, rounded up to a multiple of 16 (minimum 16).
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.config.chunk_size = align_to_block(chunk_size.max(AES_BLOCK_SIZE));
        self
    }

    /// Producer-side buffer used by pull-mode readers (minimum 1).
    #[must_use]
    pub fn with_pipe_buffer_size(mut self, size: usize) -> Self {
        self.config.pipe_buffer_size = size.max(1);
        self
    }

    #[must_use]
    pub const fn config(&self) -> ProcessorConfig {
        self.config
    }

    pub fn build<S: RawSource>(self, source: S, key: TitleKey) -> ContentProcessor<S> {
        self.build_shared(Arc::new(source), Arc::new(key))
    }

    /// Build over a source and key that are already shared.
    pub fn build_shared<S: RawSource>(self, source: Arc<S>, key: Arc<TitleKey>) -> ContentProcessor<S> {
        ContentProcessor::with_config(source, key, self.config)
    }
}

impl Default for ProcessorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
