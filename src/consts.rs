//! # Constants
//!
//! Block geometry of NUS contents, TMD record layout, and processing defaults.

/// AES block size in bytes. Every cipher operation works on multiples of this.
pub const AES_BLOCK_SIZE: usize = 16;

/// Size of one SHA1 digest, and the stride between hash-tree slots.
pub const SHA1_SIZE: usize = 20;

/// Physical block size of a hashed content (hash region + payload).
pub const HASHED_BLOCK_SIZE: usize = 0x10000;

/// Encrypted hash region at the start of every hashed block.
pub const HASH_REGION_SIZE: usize = 0x400;

/// Payload bytes carried by one hashed block.
pub const HASHED_PAYLOAD_SIZE: usize = HASHED_BLOCK_SIZE - HASH_REGION_SIZE;

/// Number of slots per hash-tree level inside a hash region.
pub const HASHES_PER_LEVEL: usize = 16;

/// Bytes covered by one level of slots (`16 * 20`).
pub const HASH_LEVEL_SIZE: usize = HASHES_PER_LEVEL * SHA1_SIZE;

/// Offset of the H0 slots within a decrypted hash region.
pub const H0_OFFSET: usize = 0;

/// Offset of the H1 slots within a decrypted hash region.
pub const H1_OFFSET: usize = HASH_LEVEL_SIZE;

/// Offset of the H2 slots within a decrypted hash region.
pub const H2_OFFSET: usize = 2 * HASH_LEVEL_SIZE;

/// Blocks covered by one H1 value.
pub const BLOCKS_PER_H1: u64 = 16;

/// Blocks covered by one H2 value.
pub const BLOCKS_PER_H2: u64 = 16 * 16;

/// Blocks covered by one H3 value.
pub const BLOCKS_PER_H3: u64 = 16 * 16 * 16;

/// Default read/decrypt granularity for non-hashed contents.
pub const DEFAULT_CHUNK_SIZE: usize = 0x8000;

/// Default producer-side buffer for pull-mode readers.
pub const DEFAULT_PIPE_BUFFER_SIZE: usize = 0x10000;

/// Default granularity of reads issued by [`crate::stream::ChunkReader`].
pub const DEFAULT_READ_SIZE: usize = 0x2000;

/// Size of one content record in a TMD.
pub const TMD_CONTENT_RECORD_SIZE: usize = 0x30;

/// Content type bit: content is AES-CBC encrypted.
pub const CONTENT_TYPE_ENCRYPTED: u16 = 0x0001;

/// Content type bit: content carries an embedded H0–H2 hash tree.
pub const CONTENT_TYPE_HASHED: u16 = 0x0002;

/// Content type bit observed on titles whose hashes may not match.
pub const CONTENT_TYPE_TOLERATE_MISMATCH: u16 = 0x4000;
