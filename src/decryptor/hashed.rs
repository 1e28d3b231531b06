//! src/decryptor/hashed.rs
//! Block-wise decryption and hash-tree verification of hashed contents.
//!
//! Every `0x10000`-byte physical block decodes on its own: the `0x400`-byte
//! hash region with a zero IV, then the `0xFC00`-byte payload with the
//! block's own H0 slot as IV. Random access therefore only has to start on a
//! block boundary; no preceding ciphertext is needed.

use crate::aliases::Aes128Key16;
use crate::consts::{HASHED_BLOCK_SIZE, HASHED_PAYLOAD_SIZE, HASH_REGION_SIZE};
use crate::crypto::cbc::CbcCipher;
use crate::crypto::hash_tree::{check_block_hashes, payload_iv};
use crate::error::NusError;
use crate::stream::ChunkReader;
use crate::utils::is_graceful_close;
use std::io::{Read, Write};
use tracing::{debug, trace, warn};

/// Window and verification parameters for [`decrypt_hashed`].
#[derive(Clone, Copy)]
pub struct HashedParams<'a> {
    /// Physical index of the block the raw stream starts at.
    pub block_start: u64,
    /// Number of payload bytes to emit.
    pub size: u64,
    /// Payload offset inside the first block where emission starts.
    pub first_block_offset: usize,
    /// Flat H3 array of the content, 20 bytes per slot.
    pub h3: Option<&'a [u8]>,
    /// Run the hash-tree checks at all.
    pub verify: bool,
    pub tolerate_mismatch: bool,
}

impl<'a> HashedParams<'a> {
    pub fn new(block_start: u64, size: u64, first_block_offset: usize) -> Self {
        Self {
            block_start,
            size,
            first_block_offset,
            h3: None,
            verify: true,
            tolerate_mismatch: false,
        }
    }

    /// Parameters for the logical window `[offset, offset + size)`.
    pub fn for_window(offset: u64, size: u64) -> Self {
        let block_start = offset / HASHED_PAYLOAD_SIZE as u64;
        let first_block_offset = (offset - block_start * HASHED_PAYLOAD_SIZE as u64) as usize;
        Self::new(block_start, size, first_block_offset)
    }

    #[must_use]
    pub fn with_h3(mut self, h3: Option<&'a [u8]>) -> Self {
        self.h3 = h3;
        self
    }

    #[must_use]
    pub fn with_verification(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    #[must_use]
    pub fn with_tolerance(mut self, tolerate: bool) -> Self {
        self.tolerate_mismatch = tolerate;
        self
    }

    /// Raw byte offset of the first block.
    pub fn raw_offset(&self) -> u64 {
        self.block_start * HASHED_BLOCK_SIZE as u64
    }

    /// Number of physical blocks the window touches.
    pub fn blocks_needed(&self) -> u64 {
        let span = self.first_block_offset as u64 + self.size;
        span.div_ceil(HASHED_PAYLOAD_SIZE as u64)
    }
}

/// Decrypt a hashed content window from `input` into `output`.
///
/// `input` must be positioned at the start of block `params.block_start`.
/// Returns the number of payload bytes written; a broken pipe on `output`
/// ends the operation early without error.
///
/// # Errors
///
/// - [`NusError::ShortRead`] if a block is cut off mid-way
/// - [`NusError::ChecksumMismatch`] on the first failing hash level, unless
///   the content is tolerant
/// - [`NusError::MissingHashMaterial`] if the H3 array is too short
/// - [`NusError::Io`] for source or sink failures
pub fn decrypt_hashed<R, W>(
    input: R,
    mut output: W,
    key: &Aes128Key16,
    params: &HashedParams<'_>,
) -> Result<u64, NusError>
where
    R: Read,
    W: Write,
{
    let cipher = CbcCipher::new(key);
    let mut reader = ChunkReader::new(input);
    let mut block_buf = vec![0u8; HASHED_BLOCK_SIZE];
    let zero_iv = [0u8; 16];

    let mut block = params.block_start;
    let mut start = params.first_block_offset.min(HASHED_PAYLOAD_SIZE);
    let mut remaining = params.size;
    let mut written = 0u64;

    while remaining > 0 {
        let read = reader.next_chunk(&mut block_buf)?;
        if read == 0 {
            debug!(block, remaining, "raw source ended before window was filled");
            break;
        }
        if read != HASHED_BLOCK_SIZE {
            return Err(NusError::ShortRead {
                expected: HASHED_BLOCK_SIZE,
                got: read,
            });
        }

        let (hash_region, payload) = block_buf.split_at_mut(HASH_REGION_SIZE);
        cipher.decrypt_chunk(&zero_iv, hash_region)?;
        let iv = payload_iv(hash_region, block);
        cipher.decrypt_chunk(&iv, payload)?;

        if params.verify {
            match check_block_hashes(hash_region, params.h3, payload, block) {
                Ok(()) => {}
                Err(e) if e.is_checksum_mismatch() && params.tolerate_mismatch => {
                    warn!(block, %e, "hash mismatch on tolerant content, continuing");
                }
                Err(e) => return Err(e),
            }
        }

        let emit = ((HASHED_PAYLOAD_SIZE - start) as u64).min(remaining) as usize;
        if let Err(e) = output.write_all(&payload[start..start + emit]) {
            if is_graceful_close(&e) {
                debug!(block, written, "sink closed, stopping hashed decryption");
                return Ok(written);
            }
            return Err(e.into());
        }
        written += emit as u64;
        remaining -= emit as u64;
        trace!(block, start, emit, "hashed block decrypted");

        start = 0;
        block += 1;
    }

    if let Err(e) = output.flush() {
        if !is_graceful_close(&e) {
            return Err(e.into());
        }
    }
    Ok(written)
}
