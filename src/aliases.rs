//! # Secure-Gate Type Aliases
//!
//! Key material handled by the engine lives in [`secure-gate`](https://github.com/Slurp9187/secure-gate)
//! wrappers: zeroized on drop, readable only through `.expose_secret()`.
//!
//! - [`Aes128Key16`] - 16-byte AES-128 title key (or common key)
//! - [`Iv16`] - 16-byte initialization vector
//!
//! Digests and ciphertext are public data and stay plain arrays.

use secure_gate::fixed_alias;

fixed_alias!(pub Aes128Key16, 16); // title key, common key
fixed_alias!(pub Iv16, 16); // title IV, explicit content IV

/// One SHA1 digest / hash-tree slot.
pub type Sha1Hash = [u8; 20];
