//! src/crypto/hash_tree.rs
//! H0–H3 hash-tree verification for one physical block of a hashed content.
//!
//! A decrypted hash region is laid out as three levels of sixteen 20-byte
//! slots: H0 at `0x000`, H1 at `0x140`, H2 at `0x280`. The remaining bytes up
//! to `0x400` are padding.

use crate::aliases::Sha1Hash;
use crate::consts::{
    BLOCKS_PER_H1, BLOCKS_PER_H2, BLOCKS_PER_H3, H0_OFFSET, H1_OFFSET, H2_OFFSET,
    HASHES_PER_LEVEL, HASH_LEVEL_SIZE, SHA1_SIZE,
};
use crate::error::{HashLevel, NusError};
use sha1::{Digest, Sha1};
use tracing::warn;

/// SHA1 of `data` as a plain array.
#[inline]
pub fn sha1_hash(data: &[u8]) -> Sha1Hash {
    Sha1::digest(data).into()
}

/// Byte offset of the H0 slot belonging to `block` inside its hash region.
#[inline]
pub const fn h0_slot(block: u64) -> usize {
    H0_OFFSET + (block % BLOCKS_PER_H1) as usize * SHA1_SIZE
}

/// Byte offset of the H1 slot that covers `block`'s group of sixteen.
#[inline]
pub const fn h1_slot(block: u64) -> usize {
    H1_OFFSET + ((block / BLOCKS_PER_H1) % HASHES_PER_LEVEL as u64) as usize * SHA1_SIZE
}

/// Byte offset of the H2 slot that covers `block`'s group of 256.
#[inline]
pub const fn h2_slot(block: u64) -> usize {
    H2_OFFSET + ((block / BLOCKS_PER_H2) % HASHES_PER_LEVEL as u64) as usize * SHA1_SIZE
}

/// Byte offset into a content's flat H3 array for `block`'s group of 4096.
#[inline]
pub const fn h3_slot(block: u64) -> usize {
    ((block / BLOCKS_PER_H3) % HASHES_PER_LEVEL as u64) as usize * SHA1_SIZE
}

/// Payload IV of `block`: the first 16 bytes of its own H0 slot.
#[inline]
pub fn payload_iv(hash_region: &[u8], block: u64) -> [u8; 16] {
    let start = h0_slot(block);
    let mut iv = [0u8; 16];
    iv.copy_from_slice(&hash_region[start..start + 16]);
    iv
}

fn compare(
    level: HashLevel,
    block: u64,
    computed: &Sha1Hash,
    expected: &[u8],
) -> Result<(), NusError> {
    if computed[..] != *expected {
        return Err(NusError::checksum(level, Some(block), computed, expected));
    }
    Ok(())
}

/// Verify one block against its hash region and the content's H3 array.
///
/// Checks are fail-fast, bottom-up: H0 always; H1 on the first block of every
/// sixteen; H2 on the first of every 256; H3 on the first of every 4096. A
/// missing `h3` skips only the top level, with a warning.
///
/// # Errors
///
/// - [`NusError::ChecksumMismatch`] for the first level that does not match
/// - [`NusError::MissingHashMaterial`] if `h3` is present but too short for
///   the slot this block needs
pub fn check_block_hashes(
    hash_region: &[u8],
    h3: Option<&[u8]>,
    payload: &[u8],
    block: u64,
) -> Result<(), NusError> {
    let h0 = h0_slot(block);
    compare(
        HashLevel::H0,
        block,
        &sha1_hash(payload),
        &hash_region[h0..h0 + SHA1_SIZE],
    )?;

    if block % BLOCKS_PER_H1 != 0 {
        return Ok(());
    }
    let h1 = h1_slot(block);
    compare(
        HashLevel::H1,
        block,
        &sha1_hash(&hash_region[H0_OFFSET..H0_OFFSET + HASH_LEVEL_SIZE]),
        &hash_region[h1..h1 + SHA1_SIZE],
    )?;

    if block % BLOCKS_PER_H2 != 0 {
        return Ok(());
    }
    let h2 = h2_slot(block);
    compare(
        HashLevel::H2,
        block,
        &sha1_hash(&hash_region[H1_OFFSET..H1_OFFSET + HASH_LEVEL_SIZE]),
        &hash_region[h2..h2 + SHA1_SIZE],
    )?;

    if block % BLOCKS_PER_H3 != 0 {
        return Ok(());
    }
    let Some(h3) = h3 else {
        warn!(block, "no H3 hashes available, skipping top-level check");
        return Ok(());
    };
    let slot = h3_slot(block);
    let expected = h3.get(slot..slot + SHA1_SIZE).ok_or_else(|| {
        NusError::MissingHashMaterial(format!(
            "H3 array holds {} bytes, block {block} needs slot at {slot}",
            h3.len()
        ))
    })?;
    compare(
        HashLevel::H3,
        block,
        &sha1_hash(&hash_region[H2_OFFSET..H2_OFFSET + HASH_LEVEL_SIZE]),
        expected,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::{HASHED_PAYLOAD_SIZE, HASH_REGION_SIZE};

    /// Hash region for a lone block 0 whose payload is `payload`.
    fn region_for_single_block(payload: &[u8]) -> (Vec<u8>, Vec<u8>) {
        let mut region = vec![0u8; HASH_REGION_SIZE];
        region[..SHA1_SIZE].copy_from_slice(&sha1_hash(payload));
        let h1 = sha1_hash(&region[H0_OFFSET..H0_OFFSET + HASH_LEVEL_SIZE]);
        region[H1_OFFSET..H1_OFFSET + SHA1_SIZE].copy_from_slice(&h1);
        let h2 = sha1_hash(&region[H1_OFFSET..H1_OFFSET + HASH_LEVEL_SIZE]);
        region[H2_OFFSET..H2_OFFSET + SHA1_SIZE].copy_from_slice(&h2);
        let h3 = sha1_hash(&region[H2_OFFSET..H2_OFFSET + HASH_LEVEL_SIZE]).to_vec();
        (region, h3)
    }

    #[test]
    fn slot_offsets() {
        assert_eq!(h0_slot(20), 4 * 20);
        assert_eq!(h1_slot(20), (16 + 1) * 20);
        assert_eq!(h2_slot(20), 32 * 20);
        assert_eq!(h2_slot(256 * 3), (32 + 3) * 20);
        assert_eq!(h3_slot(4096 * 2), 2 * 20);
        assert_eq!(h3_slot(4096 * 17), 20);
    }

    #[test]
    fn valid_block_zero_passes_every_level() {
        let payload = vec![0x11u8; HASHED_PAYLOAD_SIZE];
        let (region, h3) = region_for_single_block(&payload);
        check_block_hashes(&region, Some(&h3), &payload, 0).unwrap();
    }

    #[test]
    fn payload_tamper_fails_at_h0() {
        let mut payload = vec![0x11u8; HASHED_PAYLOAD_SIZE];
        let (region, h3) = region_for_single_block(&payload);
        payload[100] ^= 1;
        let err = check_block_hashes(&region, Some(&h3), &payload, 0).unwrap_err();
        assert!(matches!(
            err,
            NusError::ChecksumMismatch { level: HashLevel::H0, block: Some(0), .. }
        ));
    }

    #[test]
    fn h1_tamper_fails_at_h1() {
        let payload = vec![0x22u8; HASHED_PAYLOAD_SIZE];
        let (mut region, h3) = region_for_single_block(&payload);
        region[H1_OFFSET] ^= 0xFF;
        let err = check_block_hashes(&region, Some(&h3), &payload, 0).unwrap_err();
        assert!(matches!(err, NusError::ChecksumMismatch { level: HashLevel::H1, .. }));
    }

    #[test]
    fn wrong_h3_fails_at_h3() {
        let payload = vec![0x33u8; HASHED_PAYLOAD_SIZE];
        let (region, mut h3) = region_for_single_block(&payload);
        h3[0] ^= 1;
        let err = check_block_hashes(&region, Some(&h3), &payload, 0).unwrap_err();
        assert!(matches!(err, NusError::ChecksumMismatch { level: HashLevel::H3, .. }));
    }

    #[test]
    fn missing_h3_only_skips_top_level() {
        let payload = vec![0x44u8; HASHED_PAYLOAD_SIZE];
        let (region, _) = region_for_single_block(&payload);
        check_block_hashes(&region, None, &payload, 0).unwrap();

        let mut broken = region.clone();
        broken[H2_OFFSET + 1] ^= 1;
        let err = check_block_hashes(&broken, None, &payload, 0).unwrap_err();
        assert!(matches!(err, NusError::ChecksumMismatch { level: HashLevel::H2, .. }));
    }

    #[test]
    fn short_h3_array_is_missing_material() {
        let payload = vec![0x55u8; HASHED_PAYLOAD_SIZE];
        let (region, h3) = region_for_single_block(&payload);
        let err = check_block_hashes(&region, Some(&h3[..10]), &payload, 0).unwrap_err();
        assert!(matches!(err, NusError::MissingHashMaterial(_)));
    }

    #[test]
    fn non_representative_block_checks_h0_only() {
        // Block 5 only looks at its own H0 slot; garbage above it is ignored.
        let payload = vec![0x66u8; HASHED_PAYLOAD_SIZE];
        let mut region = vec![0xEEu8; HASH_REGION_SIZE];
        let slot = h0_slot(5);
        region[slot..slot + SHA1_SIZE].copy_from_slice(&sha1_hash(&payload));
        check_block_hashes(&region, None, &payload, 5).unwrap();
    }

    #[test]
    fn payload_iv_is_h0_prefix() {
        let mut region = vec![0u8; HASH_REGION_SIZE];
        let slot = h0_slot(20);
        for (i, b) in region[slot..slot + SHA1_SIZE].iter_mut().enumerate() {
            *b = i as u8 + 1;
        }
        let iv = payload_iv(&region, 20);
        assert_eq!(iv[0], 1);
        assert_eq!(iv[15], 16);
    }
}
