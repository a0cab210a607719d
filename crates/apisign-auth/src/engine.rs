//! Signature generation and verification.
//!
//! Every family works over the canonical string produced by
//! [`canonicalize`](crate::canonical::canonicalize):
//!
//! | Family | Signature |
//! |--------|-----------|
//! | hash-symmetric | `hex(MD5(secret + canonical + secret))` |
//! | cipher-symmetric | `base64(nonce ‖ AES-GCM(key, nonce, canonical))` |
//! | asymmetric | `base64(Ed25519-Sign(private, canonical))` |
//! | keyed hash | `hex(HMAC-<digest>(secret, canonical))` |
//!
//! Digest comparisons are constant time. For the asymmetric family the server
//! only ever needs the caller's public key to verify; the private key is used
//! solely by [`generate`] (client side, or server-side debug issuance).

use aes_gcm::aead::consts::U12;
use aes_gcm::aead::{Aead, AeadCore, OsRng};
use aes_gcm::{Aes128Gcm, Aes256Gcm, KeyInit as AeadKeyInit, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use ed25519_dalek::{Signature, Signer};
use hmac::digest::KeyInit as HmacKeyInit;
use hmac::{Hmac, Mac};
use md5::{Digest, Md5};
use sha1::Sha1;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::algorithm::HmacDigest;
use crate::error::AuthError;
use crate::registry::{AsymmetricKey, CipherKey, SigningSecret};

type HmacMd5 = Hmac<Md5>;
type HmacSha1 = Hmac<Sha1>;
type HmacSha256 = Hmac<Sha256>;

/// Size of the AES-GCM nonce prefix in bytes.
const NONCE_LEN: usize = 12;

/// Size of the AES-GCM authentication tag in bytes.
const TAG_LEN: usize = 16;

/// Compute the signature of `canonical` with the given secret.
///
/// # Errors
///
/// Returns [`AuthError::UnsupportedAlgorithm`] for the asymmetric family when no
/// private key is held, or [`AuthError::Internal`] if a cipher or MAC cannot be
/// initialized.
pub fn generate(canonical: &str, secret: &SigningSecret<'_>) -> Result<String, AuthError> {
    match secret {
        SigningSecret::HashSymmetric(salt) => Ok(salted_md5(salt, canonical)),
        SigningSecret::CipherSymmetric(key) => {
            let sealed = seal(key, canonical.as_bytes())?;
            Ok(BASE64.encode(sealed))
        }
        SigningSecret::Asymmetric(key) => sign_ed25519(key, canonical),
        SigningSecret::KeyedHash(digest, key) => keyed_hash(*digest, key, canonical),
    }
}

/// Check a presented signature against `canonical`.
///
/// Returns `Ok(())` when the signature is accepted.
///
/// # Errors
///
/// - [`AuthError::SignatureInvalid`] when the signature is well-formed but does
///   not match.
/// - [`AuthError::CryptoFailure`] when the signature cannot be decoded or
///   decrypted (tampered or corrupt ciphertext).
/// - [`AuthError::Internal`] if a cipher or MAC cannot be initialized.
pub fn verify(canonical: &str, secret: &SigningSecret<'_>, presented: &str) -> Result<(), AuthError> {
    let algorithm = secret.algorithm();

    let matched = match secret {
        SigningSecret::HashSymmetric(salt) => {
            constant_time_eq(&salted_md5(salt, canonical), presented)
        }
        SigningSecret::CipherSymmetric(key) => {
            let sealed = decode_base64(presented)?;
            let plaintext = open(key, &sealed)?;
            bool::from(plaintext.as_slice().ct_eq(canonical.as_bytes()))
        }
        SigningSecret::Asymmetric(key) => {
            let bytes = decode_base64(presented)?;
            let signature = Signature::from_slice(&bytes)
                .map_err(|e| AuthError::CryptoFailure(format!("malformed Ed25519 signature: {e}")))?;
            key.verifying_key()
                .verify_strict(canonical.as_bytes(), &signature)
                .is_ok()
        }
        SigningSecret::KeyedHash(digest, key) => {
            constant_time_eq(&keyed_hash(*digest, key, canonical)?, presented)
        }
    };

    if matched {
        debug!(%algorithm, "signature verification succeeded");
        Ok(())
    } else {
        debug!(%algorithm, canonical, "signature mismatch");
        Err(AuthError::SignatureInvalid)
    }
}

/// `hex(MD5(salt + canonical + salt))`.
fn salted_md5(salt: &str, canonical: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(salt.as_bytes());
    hasher.update(canonical.as_bytes());
    hasher.update(salt.as_bytes());
    hex::encode(hasher.finalize())
}

/// `hex(HMAC-<digest>(key, canonical))`.
fn keyed_hash(digest: HmacDigest, key: &str, canonical: &str) -> Result<String, AuthError> {
    let tag = match digest {
        HmacDigest::Md5 => {
            let mut mac = <HmacMd5 as HmacKeyInit>::new_from_slice(key.as_bytes())
                .map_err(hmac_key_rejected)?;
            mac.update(canonical.as_bytes());
            mac.finalize().into_bytes().to_vec()
        }
        HmacDigest::Sha1 => {
            let mut mac = <HmacSha1 as HmacKeyInit>::new_from_slice(key.as_bytes())
                .map_err(hmac_key_rejected)?;
            mac.update(canonical.as_bytes());
            mac.finalize().into_bytes().to_vec()
        }
        HmacDigest::Sha256 => {
            let mut mac = <HmacSha256 as HmacKeyInit>::new_from_slice(key.as_bytes())
                .map_err(hmac_key_rejected)?;
            mac.update(canonical.as_bytes());
            mac.finalize().into_bytes().to_vec()
        }
    };
    Ok(hex::encode(tag))
}

fn hmac_key_rejected(err: impl std::fmt::Display) -> AuthError {
    AuthError::Internal(format!("HMAC key rejected: {err}"))
}

fn sign_ed25519(key: &AsymmetricKey, canonical: &str) -> Result<String, AuthError> {
    let signing = key.signing_key().ok_or_else(|| {
        AuthError::UnsupportedAlgorithm("ed25519 signing requires a private key".to_owned())
    })?;
    let signature = signing.sign(canonical.as_bytes());
    Ok(BASE64.encode(signature.to_bytes()))
}

/// Encrypt under a fresh random nonce; output is `nonce ‖ ciphertext ‖ tag`.
fn seal(key: &CipherKey, plaintext: &[u8]) -> Result<Vec<u8>, AuthError> {
    match key.as_bytes().len() {
        16 => seal_with::<Aes128Gcm>(key.as_bytes(), plaintext),
        _ => seal_with::<Aes256Gcm>(key.as_bytes(), plaintext),
    }
}

fn open(key: &CipherKey, sealed: &[u8]) -> Result<Vec<u8>, AuthError> {
    if sealed.len() < NONCE_LEN + TAG_LEN {
        return Err(AuthError::CryptoFailure("ciphertext too short".to_owned()));
    }
    match key.as_bytes().len() {
        16 => open_with::<Aes128Gcm>(key.as_bytes(), sealed),
        _ => open_with::<Aes256Gcm>(key.as_bytes(), sealed),
    }
}

fn seal_with<C>(key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, AuthError>
where
    C: Aead + AeadCore<NonceSize = U12> + AeadKeyInit,
{
    let cipher = C::new_from_slice(key)
        .map_err(|e| AuthError::Internal(format!("cipher key rejected: {e}")))?;
    let nonce = C::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|_| AuthError::Internal("encryption failed".to_owned()))?;

    let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    sealed.extend_from_slice(nonce.as_slice());
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

fn open_with<C>(key: &[u8], sealed: &[u8]) -> Result<Vec<u8>, AuthError>
where
    C: Aead + AeadCore<NonceSize = U12> + AeadKeyInit,
{
    let cipher = C::new_from_slice(key)
        .map_err(|e| AuthError::Internal(format!("cipher key rejected: {e}")))?;
    let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| AuthError::CryptoFailure("decryption failed".to_owned()))
}

fn decode_base64(presented: &str) -> Result<Vec<u8>, AuthError> {
    BASE64
        .decode(presented)
        .map_err(|e| AuthError::CryptoFailure(format!("signature is not base64: {e}")))
}

fn constant_time_eq(expected: &str, presented: &str) -> bool {
    expected.as_bytes().ct_eq(presented.as_bytes()).into()
}
