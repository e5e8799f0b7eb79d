//! Keyed symmetric transform for cache payloads.
//!
//! AES-128 in ECB mode with PKCS#7 padding and no IV: the same plaintext under
//! the same secret always encrypts to the same bytes, and tampering is not
//! detected beyond a padding check. This obscures cache files on disk; it is
//! not a secret store.

use aes::Aes128;
use ecb::cipher::block_padding::Pkcs7;
use ecb::cipher::{BlockDecryptMut, BlockEncryptMut, KeyInit};
use sha2::{Digest, Sha512};
use thiserror::Error;

type Aes128EcbEnc = ecb::Encryptor<Aes128>;
type Aes128EcbDec = ecb::Decryptor<Aes128>;

/// Key size of the block cipher in bytes.
pub const KEY_LEN: usize = 16;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    /// Ciphertext length or padding is invalid for the derived key.
    #[error("failed to decrypt payload ({len} bytes): bad length or padding")]
    Unpad { len: usize },
}

/// Derive a cipher key from `secret` (SHA-512, truncated to [`KEY_LEN`]).
pub fn derive_key(secret: &str) -> [u8; KEY_LEN] {
    let digest = Sha512::digest(secret.as_bytes());
    let mut key = [0u8; KEY_LEN];
    key.copy_from_slice(&digest[..KEY_LEN]);
    key
}

pub fn encrypt(plaintext: &[u8], secret: &str) -> Vec<u8> {
    let key = derive_key(secret);
    Aes128EcbEnc::new(&key.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext)
}

pub fn decrypt(ciphertext: &[u8], secret: &str) -> Result<Vec<u8>, CryptoError> {
    let key = derive_key(secret);
    Aes128EcbDec::new(&key.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CryptoError::Unpad {
            len: ciphertext.len(),
        })
}
