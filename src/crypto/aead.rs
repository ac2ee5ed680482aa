use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use aes_gcm::Aes256Gcm;
use chacha20poly1305::{
    Key, XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit, generic_array::GenericArray},
};
use getrandom::fill;
use zeroize::Zeroizing;

use super::{AES_GCM_NONCE_LEN, KEY_LEN, XCHACHA_NONCE_LEN};
use crate::error::VaultError;

/// The authenticated cipher an archive is sealed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherSuite {
    XChaCha20Poly1305,
    Aes256Gcm,
}

impl CipherSuite {
    /// Hardware-accelerated AES-256-GCM when the CPU supports it, otherwise
    /// XChaCha20-Poly1305. Decided once per process.
    pub fn preferred() -> Self {
        static PREFERRED: OnceLock<CipherSuite> = OnceLock::new();
        *PREFERRED.get_or_init(|| {
            if aes_hardware_available() {
                CipherSuite::Aes256Gcm
            } else {
                CipherSuite::XChaCha20Poly1305
            }
        })
    }

    pub fn nonce_len(self) -> usize {
        match self {
            CipherSuite::XChaCha20Poly1305 => XCHACHA_NONCE_LEN,
            CipherSuite::Aes256Gcm => AES_GCM_NONCE_LEN,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CipherSuite::XChaCha20Poly1305 => "xchacha20poly1305",
            CipherSuite::Aes256Gcm => "aes256gcm",
        }
    }
}

impl fmt::Display for CipherSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CipherSuite {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "xchacha20poly1305" => Ok(CipherSuite::XChaCha20Poly1305),
            "aes256gcm" => Ok(CipherSuite::Aes256Gcm),
            other => Err(format!("unknown cipher suite '{other}'")),
        }
    }
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
fn aes_hardware_available() -> bool {
    std::arch::is_x86_feature_detected!("aes") && std::arch::is_x86_feature_detected!("pclmulqdq")
}

#[cfg(target_arch = "aarch64")]
fn aes_hardware_available() -> bool {
    std::arch::is_aarch64_feature_detected!("aes")
}

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64", target_arch = "aarch64")))]
fn aes_hardware_available() -> bool {
    false
}

/// Fill buffer with cryptographically secure random bytes
pub fn secure_random(buf: &mut [u8]) -> Result<(), VaultError> {
    fill(buf).map_err(|_| VaultError::Random)
}

/// Encrypt plaintext under a fresh random nonce.
///
/// Returns the ciphertext (with its tag appended) and the nonce.
pub fn encrypt(
    suite: CipherSuite,
    key: &[u8; KEY_LEN],
    plaintext: &[u8],
) -> Result<(Vec<u8>, Vec<u8>), VaultError> {
    let mut nonce = vec![0u8; suite.nonce_len()];
    secure_random(&mut nonce)?;

    let ciphertext = match suite {
        CipherSuite::XChaCha20Poly1305 => XChaCha20Poly1305::new(Key::from_slice(key))
            .encrypt(XNonce::from_slice(&nonce), plaintext),
        CipherSuite::Aes256Gcm => Aes256Gcm::new(GenericArray::from_slice(key))
            .encrypt(GenericArray::from_slice(&nonce), plaintext),
    }
    .map_err(|_| VaultError::Encryption)?;

    Ok((ciphertext, nonce))
}

/// Verify and decrypt ciphertext.
///
/// Nothing is returned unless the tag verifies. A wrong key and altered data
/// fail with the same `VaultError::Integrity`.
pub fn decrypt(
    suite: CipherSuite,
    key: &[u8; KEY_LEN],
    nonce: &[u8],
    ciphertext: &[u8],
) -> Result<Zeroizing<Vec<u8>>, VaultError> {
    if nonce.len() != suite.nonce_len() {
        return Err(VaultError::Format(format!(
            "{suite} expects a {}-byte nonce, got {}",
            suite.nonce_len(),
            nonce.len()
        )));
    }

    let plaintext = match suite {
        CipherSuite::XChaCha20Poly1305 => XChaCha20Poly1305::new(Key::from_slice(key))
            .decrypt(XNonce::from_slice(nonce), ciphertext),
        CipherSuite::Aes256Gcm => Aes256Gcm::new(GenericArray::from_slice(key))
            .decrypt(GenericArray::from_slice(nonce), ciphertext),
    }
    .map_err(|_| VaultError::Integrity)?;

    Ok(Zeroizing::new(plaintext))
}
