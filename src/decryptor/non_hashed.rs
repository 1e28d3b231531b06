//! src/decryptor/non_hashed.rs
//! Sequential AES-CBC decryption of flat (non-hashed) contents.
//!
//! The raw stream starts at the AES block containing the first requested
//! byte. Resuming mid-content needs the ciphertext block right before that
//! point as IV, so when no IV is supplied and the window does not start in
//! the first block, those 16 bytes must be prepended to the raw stream.

use crate::aliases::{Aes128Key16, Iv16, Sha1Hash};
use crate::consts::{AES_BLOCK_SIZE, DEFAULT_CHUNK_SIZE};
use crate::crypto::cbc::{content_iv, CbcCipher};
use crate::crypto::checksum::ContentHasher;
use crate::error::NusError;
use crate::stream::ChunkReader;
use crate::utils::{align_to_block, is_graceful_close};
use std::io::{Read, Write};
use tracing::{debug, trace};

/// Window and verification parameters for [`decrypt_non_hashed`].
#[derive(Clone, Copy)]
pub struct NonHashedParams<'a> {
    /// Logical offset of the first byte to emit.
    pub offset: u64,
    /// Number of bytes to emit.
    pub size: u64,
    /// Content index, seeds the IV when the window starts in the first block.
    pub content_index: u16,
    /// Explicit IV for the first raw block; overrides both other sources.
    pub iv: Option<&'a Iv16>,
    /// Whole-content hash to verify the emitted bytes against.
    pub expected_hash: Option<&'a Sha1Hash>,
    /// Length the hash input is zero-padded to before finalizing.
    pub hash_size: u64,
    pub tolerate_mismatch: bool,
    /// Read/decrypt granularity, a multiple of 16.
    pub chunk_size: usize,
}

impl<'a> NonHashedParams<'a> {
    pub fn new(offset: u64, size: u64, content_index: u16) -> Self {
        Self {
            offset,
            size,
            content_index,
            iv: None,
            expected_hash: None,
            hash_size: 0,
            tolerate_mismatch: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    #[must_use]
    pub fn with_iv(mut self, iv: &'a Iv16) -> Self {
        self.iv = Some(iv);
        self
    }

    #[must_use]
    pub fn with_expected_hash(mut self, hash: &'a Sha1Hash, hash_size: u64) -> Self {
        self.expected_hash = Some(hash);
        self.hash_size = hash_size;
        self
    }

    #[must_use]
    pub fn with_tolerance(mut self, tolerate: bool) -> Self {
        self.tolerate_mismatch = tolerate;
        self
    }

    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = align_to_block(chunk_size.max(AES_BLOCK_SIZE));
        self
    }

    /// `true` when the raw stream must begin with 16 bytes of IV material.
    pub fn needs_iv_prefix(&self) -> bool {
        self.iv.is_none() && self.offset >= AES_BLOCK_SIZE as u64
    }
}

/// Decrypt a non-hashed content window from `input` into `output`.
///
/// Returns the number of plaintext bytes written. Stops early, without
/// error, if `output` reports a broken pipe; verification is skipped then.
///
/// # Errors
///
/// - [`NusError::ShortRead`] if the IV prefix is missing
/// - [`NusError::ChecksumMismatch`] if `expected_hash` matches neither
///   accumulation and the content is not tolerant
/// - [`NusError::Io`] for source or sink failures
pub fn decrypt_non_hashed<R, W>(
    input: R,
    mut output: W,
    key: &Aes128Key16,
    params: &NonHashedParams<'_>,
) -> Result<u64, NusError>
where
    R: Read,
    W: Write,
{
    let cipher = CbcCipher::new(key);
    let mut reader = ChunkReader::new(input);

    let mut iv = match params.iv {
        Some(iv) => *iv.expose_secret(),
        None if params.needs_iv_prefix() => {
            let mut prefix = [0u8; AES_BLOCK_SIZE];
            let got = reader.next_chunk(&mut prefix)?;
            if got != AES_BLOCK_SIZE {
                return Err(NusError::ShortRead {
                    expected: AES_BLOCK_SIZE,
                    got,
                });
            }
            prefix
        }
        None => content_iv(params.content_index),
    };

    let chunk_size = align_to_block(params.chunk_size.max(AES_BLOCK_SIZE));
    let mut buf = vec![0u8; chunk_size];
    let mut skip = (params.offset % AES_BLOCK_SIZE as u64) as usize;
    let mut remaining = params.size;
    let mut written = 0u64;
    let mut hasher = params.expected_hash.map(|_| ContentHasher::new());

    while remaining > 0 {
        let read = reader.next_chunk(&mut buf)?;
        if read == 0 {
            break;
        }
        let aligned = align_to_block(read);
        buf[read..aligned].fill(0);
        iv = cipher.decrypt_chunk(&iv, &mut buf[..aligned])?;

        let start = skip.min(aligned);
        skip -= start;
        let emit = ((aligned - start) as u64).min(remaining) as usize;
        if emit == 0 {
            continue;
        }
        let plain = &buf[start..start + emit];
        if let Err(e) = output.write_all(plain) {
            if is_graceful_close(&e) {
                debug!(written, "sink closed, stopping non-hashed decryption");
                return Ok(written);
            }
            return Err(e.into());
        }
        if let Some(h) = hasher.as_mut() {
            h.update(plain);
        }
        written += emit as u64;
        remaining -= emit as u64;
        trace!(read, emit, written, "non-hashed chunk decrypted");
    }

    if let Err(e) = output.flush() {
        if is_graceful_close(&e) {
            return Ok(written);
        }
        return Err(e.into());
    }

    if let (Some(h), Some(expected)) = (hasher, params.expected_hash) {
        h.verify(params.hash_size, expected, params.tolerate_mismatch)?;
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::cbc::encrypt_block;
    use crate::crypto::hash_tree::sha1_hash;
    use std::io::{self, Cursor};

    fn key() -> Aes128Key16 {
        Aes128Key16::new([0x21; 16])
    }

    fn encrypt(plain: &[u8], index: u16) -> Vec<u8> {
        let mut padded = plain.to_vec();
        padded.resize(align_to_block(plain.len()), 0);
        encrypt_block(&key(), &content_iv(index), &padded).unwrap().0
    }

    fn plaintext(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 % 251) as u8).collect()
    }

    #[test]
    fn whole_content_with_small_chunks() {
        let plain = plaintext(1000);
        let enc = encrypt(&plain, 5);
        let params = NonHashedParams::new(0, 1000, 5).with_chunk_size(48);
        let mut out = Vec::new();
        let n = decrypt_non_hashed(Cursor::new(&enc), &mut out, &key(), &params).unwrap();
        assert_eq!(n, 1000);
        assert_eq!(out, plain);
    }

    #[test]
    fn offset_inside_first_block_uses_index_iv() {
        let plain = plaintext(100);
        let enc = encrypt(&plain, 1);
        let params = NonHashedParams::new(5, 20, 1);
        let mut out = Vec::new();
        decrypt_non_hashed(Cursor::new(&enc), &mut out, &key(), &params).unwrap();
        assert_eq!(out, &plain[5..25]);
    }

    #[test]
    fn resumes_from_prepended_iv_block() {
        let plain = plaintext(4096);
        let enc = encrypt(&plain, 7);
        // offset 0x403: raw stream starts at 0x400, IV block at 0x3F0
        let params = NonHashedParams::new(0x403, 0x100, 7);
        assert!(params.needs_iv_prefix());
        let mut out = Vec::new();
        decrypt_non_hashed(Cursor::new(&enc[0x3F0..]), &mut out, &key(), &params).unwrap();
        assert_eq!(out, &plain[0x403..0x503]);
    }

    #[test]
    fn explicit_iv_overrides_prefix() {
        let plain = plaintext(256);
        let enc = encrypt(&plain, 2);
        let mut iv = [0u8; 16];
        iv.copy_from_slice(&enc[0x30..0x40]);
        let iv = Iv16::new(iv);
        let params = NonHashedParams::new(0x40, 0x20, 2).with_iv(&iv);
        assert!(!params.needs_iv_prefix());
        let mut out = Vec::new();
        decrypt_non_hashed(Cursor::new(&enc[0x40..]), &mut out, &key(), &params).unwrap();
        assert_eq!(out, &plain[0x40..0x60]);
    }

    #[test]
    fn missing_iv_prefix_is_short_read() {
        let params = NonHashedParams::new(0x40, 0x10, 2);
        let err = decrypt_non_hashed(Cursor::new(vec![0u8; 8]), Vec::new(), &key(), &params)
            .unwrap_err();
        assert!(matches!(err, NusError::ShortRead { expected: 16, got: 8 }));
    }

    #[test]
    fn verifies_unaligned_and_padded_hash() {
        let plain = plaintext(37);
        let enc = encrypt(&plain, 0);

        let unpadded = sha1_hash(&plain);
        let params = NonHashedParams::new(0, 37, 0).with_expected_hash(&unpadded, 48);
        decrypt_non_hashed(Cursor::new(&enc), Vec::new(), &key(), &params).unwrap();

        let mut padded_plain = plain.clone();
        padded_plain.resize(48, 0);
        let padded = sha1_hash(&padded_plain);
        let params = NonHashedParams::new(0, 37, 0).with_expected_hash(&padded, 48);
        decrypt_non_hashed(Cursor::new(&enc), Vec::new(), &key(), &params).unwrap();
    }

    #[test]
    fn wrong_hash_fails_unless_tolerant() {
        let plain = plaintext(64);
        let enc = encrypt(&plain, 0);
        let bogus = [0x99u8; 20];

        let params = NonHashedParams::new(0, 64, 0).with_expected_hash(&bogus, 64);
        let err = decrypt_non_hashed(Cursor::new(&enc), Vec::new(), &key(), &params).unwrap_err();
        assert!(err.is_checksum_mismatch());

        let mut out = Vec::new();
        let params = params.with_tolerance(true);
        decrypt_non_hashed(Cursor::new(&enc), &mut out, &key(), &params).unwrap();
        assert_eq!(out, plain);
    }

    struct ClosedSink;

    impl Write for ClosedSink {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn closed_sink_ends_quietly() {
        let plain = plaintext(64);
        let enc = encrypt(&plain, 0);
        let bogus = [0u8; 20];
        let params = NonHashedParams::new(0, 64, 0).with_expected_hash(&bogus, 64);
        let n = decrypt_non_hashed(Cursor::new(&enc), ClosedSink, &key(), &params).unwrap();
        assert_eq!(n, 0);
    }
}
