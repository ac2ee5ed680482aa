//! Single-entry compressed container.
//!
//! The container is a zip archive holding exactly one Deflate-compressed
//! entry. The entry name is returned to the caller, which uses it to tell
//! how the payload is laid out.

use std::io::{Cursor, Read, Write};

use zip::{CompressionMethod, ZipArchive, ZipWriter, result::ZipError, write::FileOptions};

use crate::error::VaultError;

/// Smallest possible zip file: a bare end-of-central-directory record.
pub const MIN_CONTAINER_LEN: usize = 22;

/// Upper bound on a decompressed payload (512 MiB).
pub const MAX_PAYLOAD_BYTES: u64 = 512 * 1024 * 1024;

fn zip_error(e: ZipError) -> VaultError {
    VaultError::Format(format!("container: {e}"))
}

pub fn compress(entry_name: &str, payload: &[u8]) -> Result<Vec<u8>, VaultError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    writer.start_file(entry_name, options).map_err(zip_error)?;
    writer.write_all(payload)?;

    let cursor = writer.finish().map_err(zip_error)?;
    Ok(cursor.into_inner())
}

pub fn decompress(container: &[u8]) -> Result<(String, Vec<u8>), VaultError> {
    if container.len() < MIN_CONTAINER_LEN {
        return Err(VaultError::Format("container too short".into()));
    }

    let mut archive = ZipArchive::new(Cursor::new(container)).map_err(zip_error)?;
    if archive.len() != 1 {
        return Err(VaultError::Format(format!(
            "expected exactly one container entry, found {}",
            archive.len()
        )));
    }

    let mut entry = archive.by_index(0).map_err(zip_error)?;
    if entry.size() > MAX_PAYLOAD_BYTES {
        return Err(VaultError::Format("container payload too large".into()));
    }
    let name = entry.name().to_string();

    let mut payload = Vec::new();
    entry
        .by_ref()
        .take(MAX_PAYLOAD_BYTES + 1)
        .read_to_end(&mut payload)
        .map_err(|e| VaultError::Format(format!("container payload unreadable: {e}")))?;

    if payload.len() as u64 > MAX_PAYLOAD_BYTES {
        return Err(VaultError::Format("container payload too large".into()));
    }

    Ok((name, payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compress_then_decompress_keeps_name_and_payload() {
        let container = compress("data", b"ciphertext and nonce").unwrap();
        let (name, payload) = decompress(&container).unwrap();

        assert_eq!(name, "data");
        assert_eq!(payload, b"ciphertext and nonce");
    }

    #[test]
    fn compresses_repetitive_payload() {
        let payload = vec![0u8; 64 * 1024];
        let container = compress("data", &payload).unwrap();
        assert!(container.len() < payload.len());
    }

    #[test]
    fn garbage_is_rejected() {
        let result = decompress(&[0xAB; 64]);
        assert!(matches!(result, Err(VaultError::Format(_))));
    }

    #[test]
    fn too_short_is_rejected() {
        let result = decompress(&[0u8; MIN_CONTAINER_LEN - 1]);
        assert!(matches!(result, Err(VaultError::Format(_))));
    }

    #[test]
    fn multiple_entries_are_rejected() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer.start_file("data", FileOptions::default()).unwrap();
        writer.write_all(b"one").unwrap();
        writer.start_file("extra", FileOptions::default()).unwrap();
        writer.write_all(b"two").unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let result = decompress(&bytes);
        assert!(matches!(result, Err(VaultError::Format(_))));
    }

    #[test]
    fn empty_zip_is_rejected() {
        let bytes = ZipWriter::new(Cursor::new(Vec::new()))
            .finish()
            .unwrap()
            .into_inner();

        let result = decompress(&bytes);
        assert!(matches!(result, Err(VaultError::Format(_))));
    }
}
