// src/encryptor/mod.rs

//! Encryption mirror of [`crate::decryptor`], used when re-packaging contents.
//!
//! Each function returns the digest the TMD needs (plaintext SHA1 for
//! non-hashed contents, H3 array and its SHA1 for hashed ones).

pub(crate) mod hashed;
pub(crate) mod non_hashed;

pub use hashed::{encrypt_hashed, HashTree, HashedDigest};
pub use non_hashed::{encrypt_non_hashed, ContentDigest};
