//! src/encryptor/hashed.rs
//! Mirror of `decryptor/hashed.rs`: builds the H0–H3 tree for a payload and
//! writes it out as `0x10000`-byte hashed blocks.
//!
//! A block's hash region holds every H0 of its group of 16, every H1 of its
//! group of 256 and every H2 of its group of 4096, so the whole tree has to
//! exist before the first block can be written. Encryption is therefore two
//! passes over a seekable input.

use crate::aliases::{Aes128Key16, Sha1Hash};
use crate::consts::{
    H0_OFFSET, H1_OFFSET, H2_OFFSET, HASHED_BLOCK_SIZE, HASHED_PAYLOAD_SIZE, HASHES_PER_LEVEL,
    HASH_LEVEL_SIZE, HASH_REGION_SIZE, SHA1_SIZE,
};
use crate::content::{Content, ContentFlags};
use crate::crypto::cbc::CbcCipher;
use crate::crypto::hash_tree::{payload_iv, sha1_hash};
use crate::error::NusError;
use crate::stream::ChunkReader;
use std::io::{Read, Seek, SeekFrom, Write};
use tracing::debug;

/// Complete hash tree of one hashed content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashTree {
    payload_size: u64,
    h0: Vec<Sha1Hash>,
    h1: Vec<Sha1Hash>,
    h2: Vec<Sha1Hash>,
    h3: Vec<Sha1Hash>,
}

/// SHA1 over groups of sixteen lower-level hashes, missing slots zero-filled.
fn hash_level(lower: &[Sha1Hash]) -> Vec<Sha1Hash> {
    lower
        .chunks(HASHES_PER_LEVEL)
        .map(|group| {
            let mut region = [0u8; HASH_LEVEL_SIZE];
            copy_slots(&mut region, group);
            sha1_hash(&region)
        })
        .collect()
}

fn copy_slots(dst: &mut [u8], slots: &[Sha1Hash]) {
    for (i, slot) in slots.iter().enumerate() {
        dst[i * SHA1_SIZE..(i + 1) * SHA1_SIZE].copy_from_slice(slot);
    }
}

fn group(level: &[Sha1Hash], index: usize) -> &[Sha1Hash] {
    let start = (index * HASHES_PER_LEVEL).min(level.len());
    let end = (start + HASHES_PER_LEVEL).min(level.len());
    &level[start..end]
}

impl HashTree {
    /// Hash a plaintext payload, `0xFC00` bytes per block; the final block is
    /// zero-padded.
    pub fn build<R: Read>(input: R) -> Result<Self, NusError> {
        let mut reader = ChunkReader::new(input);
        let mut payload = vec![0u8; HASHED_PAYLOAD_SIZE];
        let mut h0 = Vec::new();
        let mut payload_size = 0u64;

        loop {
            let read = reader.next_chunk(&mut payload)?;
            if read == 0 {
                break;
            }
            payload[read..].fill(0);
            h0.push(sha1_hash(&payload));
            payload_size += read as u64;
            if read < HASHED_PAYLOAD_SIZE {
                break;
            }
        }

        let h1 = hash_level(&h0);
        let h2 = hash_level(&h1);
        let h3 = hash_level(&h2);
        Ok(Self {
            payload_size,
            h0,
            h1,
            h2,
            h3,
        })
    }

    pub fn payload_size(&self) -> u64 {
        self.payload_size
    }

    pub fn block_count(&self) -> u64 {
        self.h0.len() as u64
    }

    pub fn h3(&self) -> &[Sha1Hash] {
        &self.h3
    }

    /// The flat H3 array as a raw source would hand it out.
    pub fn h3_bytes(&self) -> Vec<u8> {
        self.h3.concat()
    }

    /// Decrypted `0x400`-byte hash region stored in front of `block`.
    pub fn hash_region(&self, block: u64) -> [u8; HASH_REGION_SIZE] {
        let block = block as usize;
        let mut region = [0u8; HASH_REGION_SIZE];
        copy_slots(
            &mut region[H0_OFFSET..H0_OFFSET + HASH_LEVEL_SIZE],
            group(&self.h0, block / 16),
        );
        copy_slots(
            &mut region[H1_OFFSET..H1_OFFSET + HASH_LEVEL_SIZE],
            group(&self.h1, block / (16 * 16)),
        );
        copy_slots(
            &mut region[H2_OFFSET..H2_OFFSET + HASH_LEVEL_SIZE],
            group(&self.h2, block / (16 * 16 * 16)),
        );
        region
    }
}

/// What a hashed encryption produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashedDigest {
    /// Plaintext payload bytes consumed.
    pub payload_size: u64,
    /// Ciphertext bytes written, a multiple of `0x10000`.
    pub encrypted_size: u64,
    /// Flat H3 array, to be published next to the content.
    pub h3: Vec<u8>,
    /// SHA1 of `h3`, as recorded in the TMD.
    pub hash: Sha1Hash,
}

impl HashedDigest {
    /// Descriptor for the content this digest was produced for.
    pub fn content(&self, id: u32, index: u16) -> Content {
        Content::new(
            id,
            index,
            ContentFlags::ENCRYPTED | ContentFlags::HASHED,
            self.encrypted_size,
            self.payload_size,
            self.hash,
        )
    }
}

/// Encrypt the payload read from `input` as a hashed content.
///
/// `input` is read twice: once to build the tree, then again from the same
/// starting position to write the blocks.
pub fn encrypt_hashed<R, W>(
    mut input: R,
    mut output: W,
    key: &Aes128Key16,
) -> Result<HashedDigest, NusError>
where
    R: Read + Seek,
    W: Write,
{
    let start = input.stream_position()?;
    let tree = HashTree::build(&mut input)?;
    input.seek(SeekFrom::Start(start))?;

    let cipher = CbcCipher::new(key);
    let mut reader = ChunkReader::new(input);
    let mut block_buf = vec![0u8; HASHED_BLOCK_SIZE];
    let zero_iv = [0u8; 16];

    for block in 0..tree.block_count() {
        let (hash_region, payload) = block_buf.split_at_mut(HASH_REGION_SIZE);
        let read = reader.next_chunk(payload)?;
        payload[read..].fill(0);

        let region = tree.hash_region(block);
        hash_region.copy_from_slice(&region);
        let iv = payload_iv(&region, block);
        cipher.encrypt_chunk(&zero_iv, hash_region)?;
        cipher.encrypt_chunk(&iv, payload)?;
        output.write_all(&block_buf)?;
    }
    output.flush()?;

    let h3 = tree.h3_bytes();
    let hash = sha1_hash(&h3);
    debug!(
        payload_size = tree.payload_size(),
        blocks = tree.block_count(),
        "hashed content encrypted"
    );
    Ok(HashedDigest {
        payload_size: tree.payload_size(),
        encrypted_size: tree.block_count() * HASHED_BLOCK_SIZE as u64,
        h3,
        hash,
    })
}
