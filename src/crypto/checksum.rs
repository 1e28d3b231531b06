//! src/crypto/checksum.rs
//! Whole-content SHA1 verification with the zero-padding fallback.
//!
//! Titles disagree on what their TMD hash covers: some hash the content
//! exactly as long as it is, others hash it zero-padded up to the encrypted
//! (16-aligned) size. Both digests are computed and either one is accepted.

use crate::error::{HashLevel, NusError};
use sha1::{Digest, Sha1};
use tracing::{debug, warn};

const ZEROS: [u8; 0x1000] = [0u8; 0x1000];

/// Running SHA1 over the bytes a content operation emitted.
#[derive(Clone, Default)]
pub struct ContentHasher {
    hasher: Sha1,
    len: u64,
}

impl ContentHasher {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
        self.len += data.len() as u64;
    }

    /// Number of bytes hashed so far.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Finalize both the padded and the unpadded digest.
    ///
    /// The padded digest feeds zero bytes until `padded_len` bytes have been
    /// hashed; if `padded_len` is not larger than what was hashed, both
    /// digests are the same.
    pub fn finalize(self, padded_len: u64) -> ([u8; 20], [u8; 20]) {
        let unpadded: [u8; 20] = self.hasher.clone().finalize().into();
        let mut padded = self.hasher;
        let mut missing = padded_len.saturating_sub(self.len);
        while missing > 0 {
            let n = missing.min(ZEROS.len() as u64) as usize;
            padded.update(&ZEROS[..n]);
            missing -= n as u64;
        }
        (padded.finalize().into(), unpadded)
    }

    /// Compare against the expected content hash.
    ///
    /// With `tolerate` set, a mismatch is logged and `Ok(())` returned.
    pub fn verify(self, padded_len: u64, expected: &[u8; 20], tolerate: bool) -> Result<(), NusError> {
        let hashed = self.len;
        let (padded, unpadded) = self.finalize(padded_len);
        if padded == *expected || unpadded == *expected {
            debug!(hashed, padded_len, "content hash verified");
            return Ok(());
        }
        let err = NusError::checksum(HashLevel::Content, None, &padded, expected);
        if tolerate {
            warn!(%err, "content hash mismatch on tolerant content, continuing");
            return Ok(());
        }
        Err(err)
    }
}
