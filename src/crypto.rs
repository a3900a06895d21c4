use aes_gcm::aead::{rand_core::RngCore, Aead, OsRng};
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use pbkdf2::pbkdf2_hmac;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::config::{DEFAULT_PBKDF2_ITERATIONS, MAX_PBKDF2_ITERATIONS};
use crate::error::{OfficeError, Result};

const ENVELOPE_VERSION: u8 = 1;
const TAG_LEN: usize = 16;
const IV_LEN: usize = 12;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CryptoEnvelope {
    pub v: u8,
    pub salt: String,
    pub iv: String,
    pub tag: String,
    pub data: String,
    #[serde(default = "default_envelope_iterations")]
    pub iterations: u32,
}

fn default_envelope_iterations() -> u32 {
    DEFAULT_PBKDF2_ITERATIONS
}

pub fn derive_key(password: &str, salt: &[u8], iterations: u32) -> [u8; 32] {
    let mut key = [0u8; 32];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations.max(1), &mut key);
    key
}

pub fn random_salt() -> [u8; 16] {
    let mut salt = [0u8; 16];
    OsRng.fill_bytes(&mut salt);
    salt
}

pub fn encrypt_text(text: &str, password: &str, iterations: u32) -> Result<CryptoEnvelope> {
    let iterations = iterations.clamp(1, MAX_PBKDF2_ITERATIONS);
    let salt = random_salt();
    let key = derive_key(password, &salt, iterations);

    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);
    let cipher =
        Aes256Gcm::new_from_slice(key.as_slice()).map_err(|err| OfficeError::Crypto(err.to_string()))?;
    let nonce = Nonce::from_slice(&iv);
    let encrypted = cipher
        .encrypt(nonce, text.as_bytes())
        .map_err(|err| OfficeError::Crypto(err.to_string()))?;

    if encrypted.len() < TAG_LEN {
        return Err(OfficeError::Crypto("Encryption output too short.".to_string()));
    }
    let (data, tag) = encrypted.split_at(encrypted.len() - TAG_LEN);

    Ok(CryptoEnvelope {
        v: ENVELOPE_VERSION,
        salt: encode_b64(&salt),
        iv: encode_b64(&iv),
        tag: encode_b64(tag),
        data: encode_b64(data),
        iterations,
    })
}

/// `None` when the password is wrong, the envelope is damaged, or it asks
/// for a version or work factor this build does not accept.
pub fn decrypt_envelope(payload: &CryptoEnvelope, password: &str) -> Option<String> {
    if payload.v != ENVELOPE_VERSION || payload.iterations > MAX_PBKDF2_ITERATIONS {
        return None;
    }
    let salt = decode_b64(payload.salt.as_str()).ok()?;
    let iv = decode_b64(payload.iv.as_str()).ok()?;
    let tag = decode_b64(payload.tag.as_str()).ok()?;
    let data = decode_b64(payload.data.as_str()).ok()?;
    if salt.is_empty() || iv.len() != IV_LEN || tag.is_empty() {
        return None;
    }

    let key = derive_key(password, salt.as_slice(), payload.iterations);
    let cipher = Aes256Gcm::new_from_slice(key.as_slice()).ok()?;
    let nonce = Nonce::from_slice(iv.as_slice());
    let mut combined = Vec::with_capacity(data.len() + tag.len());
    combined.extend_from_slice(data.as_slice());
    combined.extend_from_slice(tag.as_slice());

    let decrypted = cipher.decrypt(nonce, combined.as_slice()).ok()?;
    String::from_utf8(decrypted).ok()
}

pub fn decode_b64(value: &str) -> Result<Vec<u8>> {
    B64.decode(value)
        .map_err(|err| OfficeError::Crypto(err.to_string()))
}

pub fn encode_b64(bytes: &[u8]) -> String {
    B64.encode(bytes)
}
