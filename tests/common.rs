//! tests/common.rs
//! Fixtures shared across integration tests: keys, deterministic payloads
//! and raw sources built with the crate's own encryption mirror.

#![allow(dead_code)] // Each test binary uses a different subset

use nuscrypt_rs::consts::HASHED_PAYLOAD_SIZE;
use nuscrypt_rs::{
    encrypt_hashed, encrypt_non_hashed, Content, ContentFlags, MemorySource, NusError, RawSource,
    RawStream, TitleKey,
};
use std::io::Cursor;
use std::sync::Mutex;

pub const TEST_TITLE_ID: u64 = 0x0005_000E_1010_1E00;
pub const TEST_KEY: [u8; 16] = [
    0x2B, 0x7E, 0x15, 0x16, 0x28, 0xAE, 0xD2, 0xA6, 0xAB, 0xF7, 0x15, 0x88, 0x09, 0xCF, 0x4F, 0x3C,
];

pub fn title_key() -> TitleKey {
    TitleKey::new(TEST_KEY, TEST_TITLE_ID)
}

/// Deterministic, non-repeating-per-block payload.
pub fn payload(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u32).wrapping_mul(2_654_435_761).rotate_left(7) as u8 ^ seed)
        .collect()
}

/// Encrypt `plain` as non-hashed content and register it in `source`.
pub fn add_non_hashed(source: &mut MemorySource, id: u32, index: u16, plain: &[u8]) -> Content {
    let mut raw = Vec::new();
    let digest = encrypt_non_hashed(plain, &mut raw, title_key().key(), index).unwrap();
    source.insert_content(id, raw);
    digest.content(id, index)
}

/// Encrypt `plain` as hashed content; the H3 array is registered only when
/// `with_h3` is set.
pub fn add_hashed(
    source: &mut MemorySource,
    id: u32,
    index: u16,
    plain: &[u8],
    with_h3: bool,
) -> Content {
    let mut raw = Vec::new();
    let digest = encrypt_hashed(Cursor::new(plain), &mut raw, title_key().key()).unwrap();
    source.insert_content(id, raw);
    if with_h3 {
        source.insert_h3(id, digest.h3.clone());
    }
    digest.content(id, index)
}

/// Store `plain` unencrypted.
pub fn add_plain(source: &mut MemorySource, id: u32, index: u16, plain: &[u8]) -> Content {
    source.insert_content(id, plain.to_vec());
    Content::new(
        id,
        index,
        ContentFlags(0),
        plain.len() as u64,
        plain.len() as u64,
        nuscrypt_rs::crypto::sha1_hash(plain),
    )
}

pub fn hashed_payload_len(blocks: usize) -> usize {
    blocks * HASHED_PAYLOAD_SIZE
}

pub fn tolerant(content: &Content) -> Content {
    let mut content = content.clone();
    content.flags = content.flags | ContentFlags::TOLERATE_MISMATCH;
    content
}

/// Raw source that records every range it is asked for.
pub struct RecordingSource<S> {
    pub inner: S,
    pub requests: Mutex<Vec<(u64, u64)>>,
}

impl<S> RecordingSource<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<(u64, u64)> {
        self.requests.lock().unwrap().clone()
    }
}

impl<S: RawSource> RawSource for RecordingSource<S> {
    fn read_raw_range(&self, content: &Content, offset: u64, len: u64)
        -> Result<RawStream<'_>, NusError> {
        self.requests.lock().unwrap().push((offset, len));
        self.inner.read_raw_range(content, offset, len)
    }

    fn h3_hashes(&self, content: &Content) -> Result<Option<Vec<u8>>, NusError> {
        self.inner.h3_hashes(content)
    }
}
