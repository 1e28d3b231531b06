//! Utility functions used across the library.

use crate::consts::AES_BLOCK_SIZE;
use std::io;

/// XORs two 16-byte blocks and writes the result to `output`.
///
/// # Panics (by contract)
///
/// Panics if any of the three slices is shorter than 16 bytes. Callers in
/// the CBC paths always pass exact AES blocks.
#[inline(always)]
pub const fn xor_blocks(block_a: &[u8], block_b: &[u8], output: &mut [u8]) {
    let mut i = 0;
    while i < 16 {
        output[i] = block_a[i] ^ block_b[i];
        i += 1;
    }
}

/// Round `len` up to the next multiple of the AES block size.
#[inline]
pub const fn align_to_block(len: usize) -> usize {
    (len + AES_BLOCK_SIZE - 1) & !(AES_BLOCK_SIZE - 1)
}

/// 64-bit variant of [`align_to_block`] for content offsets and sizes.
#[inline]
pub const fn align_to_block_u64(len: u64) -> u64 {
    (len + AES_BLOCK_SIZE as u64 - 1) & !(AES_BLOCK_SIZE as u64 - 1)
}

/// `true` if `err` means the other end of a pipe went away.
///
/// Such errors end a stream early but are not failures.
#[inline]
pub fn is_graceful_close(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::BrokenPipe
}

/// Clamp a requested `[offset, offset + size)` window to a content of
/// `total` bytes. Returns the number of bytes that can actually be produced.
#[inline]
pub fn clamp_window(total: u64, offset: u64, size: u64) -> u64 {
    if offset >= total {
        return 0;
    }
    size.min(total - offset)
}
