use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chacha20poly1305::{aead::Aead, KeyInit};
use rand_core::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;
use zeroize::Zeroizing;

pub const KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 24;
const TAG_LEN: usize = 16;

const MIB: u32 = 1024;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid kdf parameters: {0}")]
    InvalidParams(argon2::Error),
    #[error("key derivation failed: {0}")]
    DerivationFailed(argon2::Error),
    #[error("invalid key length: expected {KEY_LEN} bytes, got {0}")]
    InvalidKeyLength(usize),
    #[error("AEAD encryption failed")]
    EncryptionFailed,
    #[error("malformed envelope: {0}")]
    Malformed(&'static str),
    #[error("authentication failed: wrong key or tampered ciphertext")]
    Authentication,
    #[error("invalid opaque encoding: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("password hashing failed: {0}")]
    PasswordHash(String),
}

/// Argon2id cost parameters used by [`derive_key`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    pub m_cost_kib: u32,
    pub t_cost: u32,
    pub p_cost: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            m_cost_kib: 64 * MIB,
            t_cost: 3,
            p_cost: 1,
        }
    }
}

impl KdfParams {
    fn to_argon2(self) -> Result<argon2::Params, CryptoError> {
        argon2::Params::new(self.m_cost_kib, self.t_cost, self.p_cost, Some(KEY_LEN))
            .map_err(CryptoError::InvalidParams)
    }
}

/// Symmetric key for record envelopes. Lives only in client memory.
#[derive(zeroize::Zeroize, zeroize::ZeroizeOnDrop)]
pub struct VaultKey(Zeroizing<[u8; KEY_LEN]>);

impl VaultKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; KEY_LEN] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidKeyLength(bytes.len()))?;
        Ok(Self(Zeroizing::new(arr)))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

/// Deterministic salt for a username. Argon2 rejects salts shorter than 8 bytes,
/// so the username is hashed rather than used directly.
pub fn username_salt(username: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(username.as_bytes());
    hasher.finalize().into()
}

/// Derive the vault key from a passphrase. Same inputs always give the same key.
pub fn derive_key(
    passphrase: &str,
    salt: &[u8],
    params: &KdfParams,
) -> Result<VaultKey, CryptoError> {
    let argon2 = argon2::Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        params.to_argon2()?,
    );

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    argon2
        .hash_password_into(passphrase.as_bytes(), salt, key.as_mut())
        .map_err(CryptoError::DerivationFailed)?;

    Ok(VaultKey(key))
}

/// Encrypt `plaintext` into a base64 envelope of `nonce || ciphertext || tag`.
///
/// The nonce is drawn from the OS RNG on every call and is never supplied by
/// the caller.
pub fn encrypt(plaintext: &[u8], key: &VaultKey) -> Result<String, CryptoError> {
    let cipher = chacha20poly1305::XChaCha20Poly1305::new(&chacha20poly1305::Key::from(
        *key.as_bytes(),
    ));

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand_core::OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = chacha20poly1305::XNonce::from(nonce_bytes);

    let ct = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|_| CryptoError::EncryptionFailed)?;

    let mut envelope = Vec::with_capacity(NONCE_LEN + ct.len());
    envelope.extend_from_slice(&nonce_bytes);
    envelope.extend_from_slice(&ct);
    Ok(STANDARD.encode(envelope))
}

/// Open an envelope produced by [`encrypt`].
pub fn decrypt(envelope: &str, key: &VaultKey) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let raw = STANDARD
        .decode(envelope.trim())
        .map_err(|_| CryptoError::Malformed("not base64"))?;
    if raw.len() < NONCE_LEN + TAG_LEN {
        return Err(CryptoError::Malformed("envelope too short"));
    }
    let (nonce_bytes, ct) = raw.split_at(NONCE_LEN);

    let cipher = chacha20poly1305::XChaCha20Poly1305::new(&chacha20poly1305::Key::from(
        *key.as_bytes(),
    ));
    let nonce = chacha20poly1305::XNonce::from_slice(nonce_bytes);

    let pt = cipher
        .decrypt(nonce, ct)
        .map_err(|_| CryptoError::Authentication)?;
    Ok(Zeroizing::new(pt))
}

/// Reversible encoding for Binary payloads. Provides no confidentiality.
pub fn encode_opaque(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub fn decode_opaque(text: &str) -> Result<Vec<u8>, CryptoError> {
    Ok(STANDARD.decode(text.trim())?)
}

/// Hash a login password into an Argon2 PHC string with a random salt.
pub fn hash_password(password: &str) -> Result<String, CryptoError> {
    let salt = SaltString::generate(&mut rand_core::OsRng);
    argon2::Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CryptoError::PasswordHash(e.to_string()))
}

/// Check a password against a stored PHC string. A mismatch is `Ok(false)`;
/// an unparsable hash is an error.
pub fn verify_password(password: &str, phc: &str) -> Result<bool, CryptoError> {
    let parsed = PasswordHash::new(phc).map_err(|e| CryptoError::PasswordHash(e.to_string()))?;
    match argon2::Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(CryptoError::PasswordHash(e.to_string())),
    }
}
