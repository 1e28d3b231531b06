//! # Title key material
//!
//! The ticket carries the title key encrypted under a console-wide common
//! key; unwrapping it is AES-128-CBC with the title IV (big-endian title ID
//! followed by eight zero bytes). The unwrapped key decrypts every content
//! of the title.

use crate::aliases::{Aes128Key16, Iv16};
use crate::crypto::cbc::CbcCipher;
use crate::error::NusError;
use std::fmt;

/// Title IV derived from a title ID.
pub fn title_iv(title_id: u64) -> [u8; 16] {
    let mut iv = [0u8; 16];
    iv[..8].copy_from_slice(&title_id.to_be_bytes());
    iv
}

/// Decrypted title key plus the title IV, one per title.
///
/// Engines borrow this (directly or through an `Arc`); nothing in the crate
/// mutates it after construction.
pub struct TitleKey {
    title_id: u64,
    key: Aes128Key16,
    iv: Iv16,
}

impl TitleKey {
    /// Wrap an already decrypted title key.
    pub fn new(key: [u8; 16], title_id: u64) -> Self {
        Self {
            title_id,
            key: Aes128Key16::new(key),
            iv: Iv16::new(title_iv(title_id)),
        }
    }

    /// Unwrap the encrypted title key found in a ticket.
    pub fn from_encrypted(
        common_key: &Aes128Key16,
        encrypted_title_key: &[u8; 16],
        title_id: u64,
    ) -> Result<Self, NusError> {
        let mut key = *encrypted_title_key;
        CbcCipher::new(common_key).decrypt_chunk(&title_iv(title_id), &mut key)?;
        Ok(Self::new(key, title_id))
    }

    /// Encrypt this title key under `common_key`, as stored in a ticket.
    pub fn to_encrypted(&self, common_key: &Aes128Key16) -> Result<[u8; 16], NusError> {
        let mut out = *self.key.expose_secret();
        CbcCipher::new(common_key).encrypt_chunk(self.iv.expose_secret(), &mut out)?;
        Ok(out)
    }

    pub fn title_id(&self) -> u64 {
        self.title_id
    }

    pub fn key(&self) -> &Aes128Key16 {
        &self.key
    }

    pub fn iv(&self) -> &Iv16 {
        &self.iv
    }
}

impl fmt::Debug for TitleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TitleKey")
            .field("title_id", &format_args!("{:016X}", self.title_id))
            .field("key", &"[REDACTED]")
            .finish()
    }
}
