//! tests/builder_tests.rs
//! ProcessorBuilder configuration reaching the processor.

mod common;
use common::title_key;

use nuscrypt_rs::{MemorySource, ProcessorBuilder, ProcessorConfig};
use std::sync::Arc;

#[test]
fn default_builder_matches_default_config() {
    let processor = ProcessorBuilder::default().build(MemorySource::new(), title_key());
    assert_eq!(*processor.config(), ProcessorConfig::default());
}

#[test]
fn builder_chain_sets_every_field() {
    let processor = ProcessorBuilder::new()
        .with_verification(false)
        .with_required_h3(true)
        .with_chunk_size(0x1001)
        .with_pipe_buffer_size(0)
        .build(MemorySource::new(), title_key());

    let config = processor.config();
    assert!(!config.verify_hashes);
    assert!(config.require_h3);
    assert_eq!(config.chunk_size, 0x1010);
    assert_eq!(config.pipe_buffer_size, 1);
}

#[test]
fn shared_build_reuses_source_and_key() {
    let source = Arc::new(MemorySource::new());
    let key = Arc::new(title_key());
    let a = ProcessorBuilder::new().build_shared(Arc::clone(&source), Arc::clone(&key));
    let b = a.clone();
    assert_eq!(a.key().title_id(), b.key().title_id());
    assert_eq!(Arc::strong_count(&source), 3);
}
