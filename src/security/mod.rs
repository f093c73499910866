//! Encryption of dataset content at rest.
//!
//! Key management is external; the vault only needs an opaque
//! encrypt/decrypt transform, supplied as a [`BlobCipher`].

pub mod encryption;

pub use encryption::{AesGcmBlobCipher, BlobCipher};
