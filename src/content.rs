//! # Content descriptors
//!
//! A [`Content`] is one encrypted payload of a title, as described by its
//! TMD content record. Only the fields the decryption engine consumes are
//! modelled; everything else in the TMD is the caller's business.
//!
//! # Record Format
//!
//! All integers are big-endian.
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | `0x00` | 4    | content ID |
//! | `0x04` | 2    | content index |
//! | `0x06` | 2    | content type (flags) |
//! | `0x08` | 8    | size |
//! | `0x10` | 20   | SHA1 (zero-padded to `0x20`) |

use crate::aliases::Sha1Hash;
use crate::consts::{
    CONTENT_TYPE_ENCRYPTED, CONTENT_TYPE_HASHED, CONTENT_TYPE_TOLERATE_MISMATCH,
    HASHED_BLOCK_SIZE, HASHED_PAYLOAD_SIZE, SHA1_SIZE, TMD_CONTENT_RECORD_SIZE,
};
use crate::error::NusError;
use crate::utils::align_to_block_u64;

/// Content type bits from the TMD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ContentFlags(pub u16);

impl ContentFlags {
    pub const ENCRYPTED: Self = Self(CONTENT_TYPE_ENCRYPTED);
    pub const HASHED: Self = Self(CONTENT_TYPE_HASHED);
    pub const TOLERATE_MISMATCH: Self = Self(CONTENT_TYPE_TOLERATE_MISMATCH);

    #[inline]
    pub const fn bits(self) -> u16 {
        self.0
    }

    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn is_encrypted(self) -> bool {
        self.contains(Self::ENCRYPTED)
    }

    pub const fn is_hashed(self) -> bool {
        self.contains(Self::HASHED)
    }

    /// Observed on a handful of titles whose hashes do not verify. Kept
    /// opaque: it only turns hash mismatches into warnings.
    pub const fn tolerates_mismatch(self) -> bool {
        self.contains(Self::TOLERATE_MISMATCH)
    }
}

impl std::ops::BitOr for ContentFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

/// One content of a title. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Content {
    pub id: u32,
    /// Seeds the initial IV of non-hashed contents.
    pub index: u16,
    pub flags: ContentFlags,
    /// Size of the raw (encrypted) data as stored.
    pub encrypted_size: u64,
    /// Size of the plaintext the engine produces for the whole content.
    pub decrypted_size: u64,
    /// SHA1 of the plaintext (non-hashed) or of the H3 array (hashed).
    pub hash: Sha1Hash,
}

impl Content {
    pub fn new(
        id: u32,
        index: u16,
        flags: ContentFlags,
        encrypted_size: u64,
        decrypted_size: u64,
        hash: Sha1Hash,
    ) -> Self {
        Self {
            id,
            index,
            flags,
            encrypted_size,
            decrypted_size,
            hash,
        }
    }

    /// Build a descriptor from the TMD `size` field, deriving both sizes.
    ///
    /// Hashed contents record their raw size; the payload is whatever the
    /// `0x10000`-byte blocks carry. Non-hashed contents record the plaintext
    /// size; the raw data is that rounded up to the AES block size.
    pub fn from_record_size(id: u32, index: u16, flags: ContentFlags, size: u64, hash: Sha1Hash) -> Self {
        let (encrypted_size, decrypted_size) = if flags.is_hashed() {
            let blocks = size / HASHED_BLOCK_SIZE as u64;
            (size, blocks * HASHED_PAYLOAD_SIZE as u64)
        } else if flags.is_encrypted() {
            (align_to_block_u64(size), size)
        } else {
            (size, size)
        };
        Self::new(id, index, flags, encrypted_size, decrypted_size, hash)
    }

    /// Parse one 0x30-byte TMD content record.
    pub fn from_tmd_record(record: &[u8]) -> Result<Self, NusError> {
        if record.len() < TMD_CONTENT_RECORD_SIZE {
            return Err(NusError::Format(format!(
                "content record is {} bytes, expected {TMD_CONTENT_RECORD_SIZE}",
                record.len()
            )));
        }
        let id = u32::from_be_bytes([record[0], record[1], record[2], record[3]]);
        let index = u16::from_be_bytes([record[4], record[5]]);
        let flags = ContentFlags(u16::from_be_bytes([record[6], record[7]]));
        let mut size = [0u8; 8];
        size.copy_from_slice(&record[8..16]);
        let mut hash = [0u8; SHA1_SIZE];
        hash.copy_from_slice(&record[0x10..0x10 + SHA1_SIZE]);

        Ok(Self::from_record_size(id, index, flags, u64::from_be_bytes(size), hash))
    }

    /// Serialize back into a 0x30-byte TMD content record.
    pub fn to_tmd_record(&self) -> [u8; TMD_CONTENT_RECORD_SIZE] {
        let size = if self.flags.is_hashed() || !self.flags.is_encrypted() {
            self.encrypted_size
        } else {
            self.decrypted_size
        };
        let mut record = [0u8; TMD_CONTENT_RECORD_SIZE];
        record[0..4].copy_from_slice(&self.id.to_be_bytes());
        record[4..6].copy_from_slice(&self.index.to_be_bytes());
        record[6..8].copy_from_slice(&self.flags.bits().to_be_bytes());
        record[8..16].copy_from_slice(&size.to_be_bytes());
        record[0x10..0x10 + SHA1_SIZE].copy_from_slice(&self.hash);
        record
    }

    #[inline]
    pub fn is_encrypted(&self) -> bool {
        self.flags.is_encrypted()
    }

    #[inline]
    pub fn is_hashed(&self) -> bool {
        self.flags.is_hashed()
    }

    #[inline]
    pub fn tolerates_mismatch(&self) -> bool {
        self.flags.tolerates_mismatch()
    }

    /// Conventional file name of the raw data, e.g. `0000000A.app`.
    pub fn app_file_name(&self) -> String {
        format!("{:08X}.app", self.id)
    }

    /// Conventional file name of the H3 array, e.g. `0000000A.h3`.
    pub fn h3_file_name(&self) -> String {
        format!("{:08X}.h3", self.id)
    }
}

/// Parse `count` consecutive content records starting at `bytes[0]`.
pub fn parse_content_records(bytes: &[u8], count: usize) -> Result<Vec<Content>, NusError> {
    let needed = count * TMD_CONTENT_RECORD_SIZE;
    if bytes.len() < needed {
        return Err(NusError::Format(format!(
            "{count} content records need {needed} bytes, got {}",
            bytes.len()
        )));
    }
    bytes[..needed]
        .chunks_exact(TMD_CONTENT_RECORD_SIZE)
        .map(Content::from_tmd_record)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: u32, index: u16, kind: u16, size: u64) -> Vec<u8> {
        let mut r = vec![0u8; TMD_CONTENT_RECORD_SIZE];
        r[0..4].copy_from_slice(&id.to_be_bytes());
        r[4..6].copy_from_slice(&index.to_be_bytes());
        r[6..8].copy_from_slice(&kind.to_be_bytes());
        r[8..16].copy_from_slice(&size.to_be_bytes());
        r[0x10..0x24].fill(0xAB);
        r
    }

    #[test]
    fn parses_non_hashed_record() {
        let c = Content::from_tmd_record(&record(0x0A, 3, 0x2001, 0x1234)).unwrap();
        assert_eq!(c.id, 0x0A);
        assert_eq!(c.index, 3);
        assert!(c.is_encrypted());
        assert!(!c.is_hashed());
        assert_eq!(c.decrypted_size, 0x1234);
        assert_eq!(c.encrypted_size, 0x1240);
        assert_eq!(c.hash, [0xAB; 20]);
        assert_eq!(c.app_file_name(), "0000000A.app");
    }

    #[test]
    fn parses_hashed_record() {
        let c = Content::from_tmd_record(&record(1, 0, 0x2003, 3 * 0x10000)).unwrap();
        assert!(c.is_hashed());
        assert_eq!(c.encrypted_size, 3 * 0x10000);
        assert_eq!(c.decrypted_size, 3 * 0xFC00);
    }

    #[test]
    fn tolerate_bit_is_opaque_flag() {
        let c = Content::from_tmd_record(&record(1, 0, 0x4003, 0x10000)).unwrap();
        assert!(c.tolerates_mismatch());
        assert!(c.is_hashed());
    }

    #[test]
    fn record_roundtrip() {
        let raw = record(0x1F, 9, 0x2001, 0x777);
        let c = Content::from_tmd_record(&raw).unwrap();
        assert_eq!(&c.to_tmd_record()[..], &raw[..]);
    }

    #[test]
    fn short_record_is_format_error() {
        let err = Content::from_tmd_record(&[0u8; 0x20]).unwrap_err();
        assert!(matches!(err, NusError::Format(_)));
    }

    #[test]
    fn parses_record_run() {
        let mut bytes = record(1, 0, 1, 16);
        bytes.extend(record(2, 1, 3, 0x10000));
        let contents = parse_content_records(&bytes, 2).unwrap();
        assert_eq!(contents.len(), 2);
        assert_eq!(contents[1].index, 1);
        assert!(parse_content_records(&bytes, 3).is_err());
    }
}
