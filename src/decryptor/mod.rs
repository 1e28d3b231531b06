// src/decryptor/mod.rs

//! Decryption paths, one per content kind.
//!
//! These functions work on a raw stream that the caller has already
//! positioned; [`crate::processor::ContentProcessor`] computes the alignment
//! and fetches the right raw range for them.

pub(crate) mod hashed;
pub(crate) mod non_hashed;
pub(crate) mod plain;

pub use hashed::{decrypt_hashed, HashedParams};
pub use non_hashed::{decrypt_non_hashed, NonHashedParams};
pub use plain::copy_plain;
