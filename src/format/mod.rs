//! Vault archive file format.
//!
//! ```text
//! SALT (16) | CONTAINER
//! ```
//!
//! `CONTAINER` is a single-entry zip whose decompressed payload is
//! `CIPHERTEXT || NONCE`. The entry name records the cipher suite and with
//! it the nonce length:
//!
//! | entry name       | cipher             | nonce |
//! |------------------|--------------------|-------|
//! | `data`           | XChaCha20-Poly1305 | 24    |
//! | `data.aes256gcm` | AES-256-GCM        | 12    |

pub mod container;

use crate::crypto::{CipherSuite, SALT_LEN, TAG_LEN};
use crate::error::VaultError;

/// Smallest byte sequence that can possibly be a vault archive.
pub const MIN_ARCHIVE_LEN: usize = SALT_LEN + container::MIN_CONTAINER_LEN;

const XCHACHA_ENTRY: &str = "data";
const AES_GCM_ENTRY: &str = "data.aes256gcm";

fn entry_name(suite: CipherSuite) -> &'static str {
    match suite {
        CipherSuite::XChaCha20Poly1305 => XCHACHA_ENTRY,
        CipherSuite::Aes256Gcm => AES_GCM_ENTRY,
    }
}

fn suite_for_entry(name: &str) -> Result<CipherSuite, VaultError> {
    match name {
        XCHACHA_ENTRY => Ok(CipherSuite::XChaCha20Poly1305),
        AES_GCM_ENTRY => Ok(CipherSuite::Aes256Gcm),
        other => Err(VaultError::Format(format!(
            "unknown container entry '{other}'"
        ))),
    }
}

/// The parts of a sealed vault, before packing or after unpacking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultArchive {
    suite: CipherSuite,
    salt: [u8; SALT_LEN],
    nonce: Vec<u8>,
    ciphertext: Vec<u8>,
}

impl VaultArchive {
    pub fn new(
        suite: CipherSuite,
        salt: [u8; SALT_LEN],
        nonce: Vec<u8>,
        ciphertext: Vec<u8>,
    ) -> Result<Self, VaultError> {
        if nonce.len() != suite.nonce_len() {
            return Err(VaultError::Format(format!(
                "{suite} nonce must be {} bytes",
                suite.nonce_len()
            )));
        }
        Ok(Self {
            suite,
            salt,
            nonce,
            ciphertext,
        })
    }

    pub fn suite(&self) -> CipherSuite {
        self.suite
    }

    pub fn salt(&self) -> &[u8; SALT_LEN] {
        &self.salt
    }

    pub fn nonce(&self) -> &[u8] {
        &self.nonce
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    /// Serializes the archive: raw salt followed by the compressed container.
    pub fn pack(&self) -> Result<Vec<u8>, VaultError> {
        let mut payload = Vec::with_capacity(self.ciphertext.len() + self.nonce.len());
        payload.extend_from_slice(&self.ciphertext);
        payload.extend_from_slice(&self.nonce);

        let container = container::compress(entry_name(self.suite), &payload)?;

        let mut buf = Vec::with_capacity(SALT_LEN + container.len());
        buf.extend_from_slice(&self.salt);
        buf.extend_from_slice(&container);
        Ok(buf)
    }

    /// Parses archive bytes.
    ///
    /// # Errors
    ///
    /// Returns `VaultError::Format` if:
    /// - The input is shorter than [`MIN_ARCHIVE_LEN`]
    /// - The container cannot be decompressed or has other than one entry
    /// - The entry name is unknown
    /// - The payload cannot hold a nonce and an authentication tag
    pub fn unpack(data: &[u8]) -> Result<Self, VaultError> {
        if data.len() < MIN_ARCHIVE_LEN {
            return Err(VaultError::Format(format!(
                "archive is {} bytes, at least {MIN_ARCHIVE_LEN} required",
                data.len()
            )));
        }

        let (salt, container) = data.split_at(SALT_LEN);
        let salt: [u8; SALT_LEN] = salt
            .try_into()
            .map_err(|_| VaultError::Format("invalid salt length".into()))?;

        let (name, mut payload) = container::decompress(container)?;
        let suite = suite_for_entry(&name)?;

        let nonce_len = suite.nonce_len();
        if payload.len() < nonce_len + TAG_LEN {
            return Err(VaultError::Format(format!(
                "payload is {} bytes, at least {} required",
                payload.len(),
                nonce_len + TAG_LEN
            )));
        }

        let nonce = payload.split_off(payload.len() - nonce_len);

        Ok(Self {
            suite,
            salt,
            nonce,
            ciphertext: payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(suite: CipherSuite) -> VaultArchive {
        VaultArchive::new(
            suite,
            [1u8; SALT_LEN],
            vec![2u8; suite.nonce_len()],
            vec![3u8; 40],
        )
        .unwrap()
    }

    #[test]
    fn pack_unpack_roundtrip() {
        for suite in [CipherSuite::XChaCha20Poly1305, CipherSuite::Aes256Gcm] {
            let archive = sample(suite);
            let bytes = archive.pack().unwrap();

            assert_eq!(&bytes[..SALT_LEN], &[1u8; SALT_LEN]);
            assert_eq!(VaultArchive::unpack(&bytes).unwrap(), archive);
        }
    }

    #[test]
    fn salt_prefix_is_not_compressed() {
        let bytes = sample(CipherSuite::XChaCha20Poly1305).pack().unwrap();
        // zip local file header signature directly after the salt
        assert_eq!(&bytes[SALT_LEN..SALT_LEN + 4], b"PK\x03\x04");
    }

    #[test]
    fn legacy_layout_uses_trailing_24_byte_nonce() {
        let mut payload = vec![7u8; 30];
        payload.extend_from_slice(&[9u8; 24]);
        let mut bytes = vec![5u8; SALT_LEN];
        bytes.extend(container::compress("data", &payload).unwrap());

        let archive = VaultArchive::unpack(&bytes).unwrap();
        assert_eq!(archive.suite(), CipherSuite::XChaCha20Poly1305);
        assert_eq!(archive.salt(), &[5u8; SALT_LEN]);
        assert_eq!(archive.nonce(), &[9u8; 24]);
        assert_eq!(archive.ciphertext(), &[7u8; 30][..]);
    }

    #[test]
    fn short_input_is_format_error() {
        for len in [0, 1, SALT_LEN, MIN_ARCHIVE_LEN - 1] {
            let result = VaultArchive::unpack(&vec![0u8; len]);
            assert!(matches!(result, Err(VaultError::Format(_))));
        }
    }

    #[test]
    fn undersized_payload_is_format_error() {
        let mut bytes = vec![0u8; SALT_LEN];
        bytes.extend(container::compress("data", &[0u8; 24 + TAG_LEN - 1]).unwrap());

        let result = VaultArchive::unpack(&bytes);
        assert!(matches!(result, Err(VaultError::Format(_))));
    }

    #[test]
    fn unknown_entry_is_format_error() {
        let mut bytes = vec![0u8; SALT_LEN];
        bytes.extend(container::compress("notes.json", &[0u8; 64]).unwrap());

        let result = VaultArchive::unpack(&bytes);
        assert!(matches!(result, Err(VaultError::Format(_))));
    }

    #[test]
    fn corrupted_container_is_format_error() {
        let mut bytes = sample(CipherSuite::XChaCha20Poly1305).pack().unwrap();
        let last = bytes.len() - 1;
        bytes.truncate(last - 10);

        let result = VaultArchive::unpack(&bytes);
        assert!(matches!(result, Err(VaultError::Format(_))));
    }

    #[test]
    fn nonce_length_must_match_suite() {
        let result = VaultArchive::new(
            CipherSuite::Aes256Gcm,
            [0u8; SALT_LEN],
            vec![0u8; 24],
            Vec::new(),
        );
        assert!(result.is_err());
    }
}
