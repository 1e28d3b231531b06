// src/crypto/mod.rs

//! Low-level crypto primitives.
//!
//! - [`cbc`] - AES-128-CBC, no padding, explicit IV chaining
//! - [`hash_tree`] - per-block H0–H3 verification for hashed contents
//! - [`checksum`] - whole-content SHA1 with the zero-padding fallback

pub mod cbc;
pub mod checksum;
pub mod hash_tree;

pub use cbc::{content_iv, decrypt_block, encrypt_block, CbcCipher};
pub use checksum::ContentHasher;
pub use hash_tree::{check_block_hashes, payload_iv, sha1_hash};
