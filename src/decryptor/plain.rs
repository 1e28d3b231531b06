//! src/decryptor/plain.rs
//! Pass-through for contents stored without encryption.

use crate::aliases::Sha1Hash;
use crate::consts::DEFAULT_CHUNK_SIZE;
use crate::crypto::checksum::ContentHasher;
use crate::error::NusError;
use crate::stream::ChunkReader;
use crate::utils::is_graceful_close;
use std::io::{Read, Write};
use tracing::debug;

/// Copy up to `size` raw bytes from `input` to `output`.
///
/// When `expected_hash` is given the copied bytes are verified like a
/// decrypted non-hashed content, zero-padded up to `hash_size`.
pub fn copy_plain<R, W>(
    input: R,
    mut output: W,
    size: u64,
    expected_hash: Option<(&Sha1Hash, u64)>,
    tolerate_mismatch: bool,
) -> Result<u64, NusError>
where
    R: Read,
    W: Write,
{
    let mut reader = ChunkReader::new(input);
    let mut buf = vec![0u8; DEFAULT_CHUNK_SIZE];
    let mut hasher = expected_hash.map(|_| ContentHasher::new());
    let mut remaining = size;
    let mut written = 0u64;

    while remaining > 0 {
        let want = remaining.min(buf.len() as u64) as usize;
        let read = reader.next_chunk(&mut buf[..want])?;
        if read == 0 {
            break;
        }
        if let Err(e) = output.write_all(&buf[..read]) {
            if is_graceful_close(&e) {
                debug!(written, "sink closed, stopping plain copy");
                return Ok(written);
            }
            return Err(e.into());
        }
        if let Some(h) = hasher.as_mut() {
            h.update(&buf[..read]);
        }
        written += read as u64;
        remaining -= read as u64;
    }

    if let Err(e) = output.flush() {
        if is_graceful_close(&e) {
            return Ok(written);
        }
        return Err(e.into());
    }

    if let (Some(h), Some((expected, hash_size))) = (hasher, expected_hash) {
        h.verify(hash_size, expected, tolerate_mismatch)?;
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash_tree::sha1_hash;
    use std::io::Cursor;

    #[test]
    fn copies_exact_window() {
        let data: Vec<u8> = (0..200u8).collect();
        let mut out = Vec::new();
        let n = copy_plain(Cursor::new(&data[10..]), &mut out, 50, None, false).unwrap();
        assert_eq!(n, 50);
        assert_eq!(out, &data[10..60]);
    }

    #[test]
    fn verifies_whole_copy() {
        let data = vec![0x61u8; 300];
        let hash = sha1_hash(&data);
        copy_plain(Cursor::new(&data), Vec::new(), 300, Some((&hash, 300)), false).unwrap();

        let err = copy_plain(Cursor::new(&data), Vec::new(), 300, Some((&[0u8; 20], 300)), false)
            .unwrap_err();
        assert!(err.is_checksum_mismatch());
    }
}
