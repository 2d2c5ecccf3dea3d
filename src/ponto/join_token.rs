//! Sealed registration payloads and validation tokens.
//!
//! Trusted frontends can pre-seal the whole registration payload with a
//! shared 32-byte key; `/@join` also mints the validation token handed to the
//! provisioning consumer by sealing the effective payload the same way.
//! Format: ChaCha20-Poly1305 over the JSON payload, `nonce || ciphertext`,
//! URL-safe base64 without padding.

use anyhow::{anyhow, Context, Result};
use base64ct::{Base64, Base64UrlUnpadded, Encoding};
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Key, Nonce,
};
use rand::{rngs::OsRng, RngCore};
use serde::{de::DeserializeOwned, Serialize};

const AAD: &[u8] = b"ponto-join:v1";
const NONCE_LEN: usize = 12;

/// Decode the configured base64 key and check its length.
///
/// # Errors
/// Returns an error when the input is not base64 or not 32 bytes.
pub fn decode_key(b64: &str) -> Result<[u8; 32]> {
    let bytes = Base64::decode_vec(b64).map_err(|err| anyhow!("Invalid join key: {err}"))?;
    bytes
        .try_into()
        .map_err(|_| anyhow!("Join key must be 32 bytes"))
}

/// Seal a payload into an opaque token.
///
/// # Errors
/// Returns an error if serialization or encryption fails.
pub fn seal<T: Serialize>(key: &[u8; 32], payload: &T) -> Result<String> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let msg = serde_json::to_vec(payload).context("Failed to serialize join payload")?;
    let ciphertext = cipher
        .encrypt(nonce, Payload { msg: &msg, aad: AAD })
        .map_err(|err| anyhow!("Encryption failure: {err}"))?;

    let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&ciphertext);

    Ok(Base64UrlUnpadded::encode_string(&sealed))
}

/// Open a sealed token back into its payload.
///
/// # Errors
/// Returns an error on malformed encoding, failed authentication, or a
/// payload that does not deserialize. Callers treat any of these as
/// "not validated", never as fatal.
pub fn open<T: DeserializeOwned>(key: &[u8; 32], token: &str) -> Result<T> {
    let sealed =
        Base64UrlUnpadded::decode_vec(token).map_err(|err| anyhow!("Invalid token: {err}"))?;

    if sealed.len() < NONCE_LEN {
        return Err(anyhow!("Invalid token length"));
    }

    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    let plaintext = cipher
        .decrypt(
            Nonce::from_slice(nonce_bytes),
            Payload {
                msg: ciphertext,
                aad: AAD,
            },
        )
        .map_err(|err| anyhow!("Decryption failure: {err}"))?;

    serde_json::from_slice(&plaintext).context("Failed to deserialize join payload")
}
