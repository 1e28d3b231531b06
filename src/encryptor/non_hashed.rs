//! src/encryptor/non_hashed.rs
//! Mirror of `decryptor/non_hashed.rs`: index-IV AES-CBC over the whole
//! content, zero-padded to the AES block size.

use crate::aliases::{Aes128Key16, Sha1Hash};
use crate::consts::DEFAULT_CHUNK_SIZE;
use crate::content::{Content, ContentFlags};
use crate::crypto::cbc::{content_iv, CbcCipher};
use crate::crypto::checksum::ContentHasher;
use crate::error::NusError;
use crate::stream::ChunkReader;
use crate::utils::align_to_block;
use std::io::{Read, Write};
use tracing::debug;

/// What a non-hashed encryption produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentDigest {
    /// Plaintext bytes consumed.
    pub size: u64,
    /// Ciphertext bytes written.
    pub encrypted_size: u64,
    /// SHA1 of the plaintext, as recorded in the TMD.
    pub hash: Sha1Hash,
}

impl ContentDigest {
    /// Descriptor for the content this digest was produced for.
    pub fn content(&self, id: u32, index: u16) -> Content {
        Content::new(
            id,
            index,
            ContentFlags::ENCRYPTED,
            self.encrypted_size,
            self.size,
            self.hash,
        )
    }
}

/// Encrypt `input` as non-hashed content number `index`.
pub fn encrypt_non_hashed<R, W>(
    input: R,
    mut output: W,
    key: &Aes128Key16,
    index: u16,
) -> Result<ContentDigest, NusError>
where
    R: Read,
    W: Write,
{
    let cipher = CbcCipher::new(key);
    let mut reader = ChunkReader::new(input);
    let mut buf = vec![0u8; DEFAULT_CHUNK_SIZE];
    let mut iv = content_iv(index);
    let mut hasher = ContentHasher::new();
    let mut encrypted_size = 0u64;

    loop {
        let read = reader.next_chunk(&mut buf)?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
        let aligned = align_to_block(read);
        buf[read..aligned].fill(0);
        iv = cipher.encrypt_chunk(&iv, &mut buf[..aligned])?;
        output.write_all(&buf[..aligned])?;
        encrypted_size += aligned as u64;
        if read < buf.len() {
            break;
        }
    }
    output.flush()?;

    let size = hasher.len();
    let (hash, _) = hasher.finalize(size);
    debug!(index, size, encrypted_size, "non-hashed content encrypted");
    Ok(ContentDigest {
        size,
        encrypted_size,
        hash,
    })
}
