//! AES-GCM encryption and decryption for dataset content at rest

use crate::error::{VaultError, VaultResult};
use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose, Engine as _};

const NONCE_LEN: usize = 12;

/// Opaque byte transform applied to dataset content before it is stored.
pub trait BlobCipher: Send + Sync {
    fn encrypt(&self, plaintext: &[u8]) -> VaultResult<Vec<u8>>;
    fn decrypt(&self, blob: &[u8]) -> VaultResult<Vec<u8>>;
}

/// AES-256-GCM cipher. Blobs are `nonce (12 bytes) | ciphertext | tag`.
pub struct AesGcmBlobCipher {
    cipher: Aes256Gcm,
}

impl AesGcmBlobCipher {
    /// Create a cipher from a 32-byte key
    pub fn new(key: &[u8; 32]) -> Self {
        let key = Key::<Aes256Gcm>::from_slice(key);
        Self {
            cipher: Aes256Gcm::new(key),
        }
    }

    /// Create a cipher from a base64-encoded 32-byte key
    pub fn from_base64(encoded: &str) -> VaultResult<Self> {
        let bytes = general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| VaultError::Encryption(format!("Invalid key encoding: {}", e)))?;
        let key: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            VaultError::Encryption(format!("Key must be 32 bytes, got {}", bytes.len()))
        })?;
        Ok(Self::new(&key))
    }

    /// Generate a random key
    pub fn generate_key() -> [u8; 32] {
        Aes256Gcm::generate_key(&mut OsRng).into()
    }
}

impl BlobCipher for AesGcmBlobCipher {
    fn encrypt(&self, plaintext: &[u8]) -> VaultResult<Vec<u8>> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|e| VaultError::Encryption(e.to_string()))?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);
        Ok(blob)
    }

    fn decrypt(&self, blob: &[u8]) -> VaultResult<Vec<u8>> {
        if blob.len() < NONCE_LEN {
            return Err(VaultError::Encryption("Blob too short".to_string()));
        }
        let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|e| VaultError::Encryption(format!("Decryption failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt() {
        let cipher = AesGcmBlobCipher::new(&AesGcmBlobCipher::generate_key());
        let blob = cipher.encrypt(b"a,b\n1,2\n").unwrap();
        assert_ne!(&blob[NONCE_LEN..], b"a,b\n1,2\n");
        assert_eq!(cipher.decrypt(&blob).unwrap(), b"a,b\n1,2\n");
    }

    #[test]
    fn test_wrong_key_fails() {
        let cipher = AesGcmBlobCipher::new(&AesGcmBlobCipher::generate_key());
        let other = AesGcmBlobCipher::new(&AesGcmBlobCipher::generate_key());
        let blob = cipher.encrypt(b"secret").unwrap();
        assert!(matches!(other.decrypt(&blob), Err(VaultError::Encryption(_))));
        assert!(matches!(cipher.decrypt(&[1, 2, 3]), Err(VaultError::Encryption(_))));
    }

    #[test]
    fn test_key_from_base64() {
        let key = AesGcmBlobCipher::generate_key();
        let encoded = general_purpose::STANDARD.encode(key);
        let cipher = AesGcmBlobCipher::from_base64(&encoded).unwrap();
        let blob = AesGcmBlobCipher::new(&key).encrypt(b"x").unwrap();
        assert_eq!(cipher.decrypt(&blob).unwrap(), b"x");
        assert!(AesGcmBlobCipher::from_base64("c2hvcnQ=").is_err());
    }
}
