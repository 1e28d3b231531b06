//! src/crypto/cbc.rs
//! AES-128-CBC without padding, IV threaded explicitly by the caller.
//!
//! Nothing here remembers an IV between calls. Every operation takes the IV
//! to start from and returns the IV the next contiguous chunk must use,
//! which is always the last 16 bytes of ciphertext.

use crate::aliases::Aes128Key16;
use crate::consts::AES_BLOCK_SIZE;
use crate::error::NusError;
use crate::utils::xor_blocks;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::{Aes128Dec, Aes128Enc, Block as AesBlock};

/// Expanded AES-128 key schedule for one decrypt or encrypt session.
///
/// Built once per operation; the schedule is immutable, so the only state
/// that changes between chunks is the IV the caller passes back in.
pub struct CbcCipher {
    decryptor: Aes128Dec,
    encryptor: Aes128Enc,
}

impl CbcCipher {
    pub fn new(key: &Aes128Key16) -> Self {
        Self::from_key_bytes(key.expose_secret())
    }

    pub(crate) fn from_key_bytes(key: &[u8; 16]) -> Self {
        Self {
            decryptor: Aes128Dec::new(key.into()),
            encryptor: Aes128Enc::new(key.into()),
        }
    }

    /// Decrypt `data` in place starting from `iv`.
    ///
    /// Returns the IV for the chunk that follows `data` in the ciphertext.
    /// An empty buffer decrypts to nothing and hands `iv` back unchanged.
    pub fn decrypt_chunk(&self, iv: &[u8; 16], data: &mut [u8]) -> Result<[u8; 16], NusError> {
        check_alignment(data.len())?;
        let mut previous = *iv;
        for chunk in data.chunks_exact_mut(AES_BLOCK_SIZE) {
            let mut ciphertext = [0u8; 16];
            ciphertext.copy_from_slice(chunk);
            let mut block = AesBlock::from(ciphertext);
            self.decryptor.decrypt_block(&mut block);
            xor_blocks(block.as_slice(), &previous, chunk);
            previous = ciphertext;
        }
        Ok(previous)
    }

    /// Encrypt `data` in place starting from `iv`.
    ///
    /// Returns the last ciphertext block, i.e. the IV for the next chunk.
    pub fn encrypt_chunk(&self, iv: &[u8; 16], data: &mut [u8]) -> Result<[u8; 16], NusError> {
        check_alignment(data.len())?;
        let mut previous = *iv;
        for chunk in data.chunks_exact_mut(AES_BLOCK_SIZE) {
            let mut mixed = [0u8; 16];
            xor_blocks(chunk, &previous, &mut mixed);
            let mut block = AesBlock::from(mixed);
            self.encryptor.encrypt_block(&mut block);
            chunk.copy_from_slice(block.as_slice());
            previous.copy_from_slice(chunk);
        }
        Ok(previous)
    }
}

#[inline]
fn check_alignment(len: usize) -> Result<(), NusError> {
    if len % AES_BLOCK_SIZE != 0 {
        return Err(NusError::Alignment(len));
    }
    Ok(())
}

/// One-shot decrypt: `(plaintext, next_iv)`.
pub fn decrypt_block(
    key: &Aes128Key16,
    iv: &[u8; 16],
    ciphertext: &[u8],
) -> Result<(Vec<u8>, [u8; 16]), NusError> {
    let mut buf = ciphertext.to_vec();
    let next_iv = CbcCipher::new(key).decrypt_chunk(iv, &mut buf)?;
    Ok((buf, next_iv))
}

/// One-shot encrypt: `(ciphertext, next_iv)`.
pub fn encrypt_block(
    key: &Aes128Key16,
    iv: &[u8; 16],
    plaintext: &[u8],
) -> Result<(Vec<u8>, [u8; 16]), NusError> {
    let mut buf = plaintext.to_vec();
    let next_iv = CbcCipher::new(key).encrypt_chunk(iv, &mut buf)?;
    Ok((buf, next_iv))
}

/// Initial IV of a non-hashed content: big-endian content index, then zeros.
#[inline]
pub fn content_iv(index: u16) -> [u8; 16] {
    let mut iv = [0u8; 16];
    iv[..2].copy_from_slice(&index.to_be_bytes());
    iv
}
