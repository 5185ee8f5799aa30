//! AES-128-ECB helpers for the local protocol.

use aes::Aes128;
use ecb::cipher::block_padding::Pkcs7;
use ecb::cipher::{BlockDecryptMut, BlockEncryptMut, KeyInit};
use md5::{Digest, Md5};

use crate::errors::Error;

type Result<T> = std::result::Result<T, Error>;

type Aes128EcbEnc = ecb::Encryptor<Aes128>;
type Aes128EcbDec = ecb::Decryptor<Aes128>;

pub(crate) const KEY_LEN: usize = 16;

/// A 16-byte AES key.
pub type Key = [u8; KEY_LEN];

/// Seed of the key bulbs use to encrypt their broadcast announcements.
const BROADCAST_KEY_SEED: &[u8] = b"yGAdlopoPVldABfn";

/// The fixed key for broadcast announcements: `MD5(seed)`.
pub(crate) fn broadcast_key() -> Key {
    Md5::digest(BROADCAST_KEY_SEED).into()
}

/// Interpret a device's local key string as an AES key.
pub(crate) fn device_key(local_key: &str) -> Result<Key> {
    local_key
        .as_bytes()
        .try_into()
        .map_err(|_| Error::Config(format!("local key must be {KEY_LEN} bytes, got {}", local_key.len())))
}

pub(crate) fn encrypt(key: &Key, plaintext: &[u8]) -> Vec<u8> {
    Aes128EcbEnc::new(key.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext)
}

pub(crate) fn decrypt(key: &Key, ciphertext: &[u8]) -> Result<Vec<u8>> {
    if ciphertext.is_empty() || ciphertext.len() % KEY_LEN != 0 {
        return Err(Error::malformed(format!(
            "ciphertext of {} bytes is not whole AES blocks",
            ciphertext.len()
        )));
    }
    Aes128EcbDec::new(key.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| Error::malformed("bad padding after decryption"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_key_is_md5_of_seed() {
        assert_eq!(hex::encode(broadcast_key()), "6c1ec8e2bb9bb59ab50b0daf649b410a");
    }

    #[test]
    fn round_trips_through_ecb() {
        let key = device_key("0123456789abcdef").unwrap();
        let ciphertext = encrypt(&key, br#"{"dps":{"20":true}}"#);
        assert_eq!(ciphertext.len() % KEY_LEN, 0);
        assert_eq!(decrypt(&key, &ciphertext).unwrap(), br#"{"dps":{"20":true}}"#);
    }

    #[test]
    fn rejects_partial_blocks_and_wrong_keys() {
        let key = device_key("0123456789abcdef").unwrap();
        assert!(matches!(decrypt(&key, &[0u8; 15]), Err(Error::MalformedPayload(_))));

        let ciphertext = encrypt(&key, b"hello");
        let other = device_key("fedcba9876543210").unwrap();
        // a wrong key almost always garbles the padding
        if let Ok(plain) = decrypt(&other, &ciphertext) {
            assert_ne!(plain, b"hello");
        }
    }

    #[test]
    fn key_length_is_checked() {
        assert!(matches!(device_key("short"), Err(Error::Config(_))));
    }
}
