//! Crash-safe whole-file persistence.
//!
//! Used for the notes document and for exported vault archives.

use getrandom::fill;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::StorageError;

/// A file that is only ever replaced as a whole.
#[derive(Debug, Clone)]
pub struct AtomicFile {
    path: PathBuf,
}

impl AtomicFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> Result<Vec<u8>, StorageError> {
        Ok(fs::read(&self.path)?)
    }

    /// Replaces the file contents.
    ///
    /// Data goes to a uniquely named sibling temp file, is fsynced, then
    /// renamed over the target and the parent directory is fsynced. After a
    /// crash either the old or the new contents are present, never a mix.
    ///
    /// Creates parent directories if they don't exist.
    pub fn write(&self, data: &[u8]) -> Result<(), StorageError> {
        if let Some(parent) = self.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = self.random_tmp_path()?;

        let mut tmp_file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp_path)?;

        tmp_file.write_all(data)?;
        tmp_file.sync_all()?;
        drop(tmp_file);

        if let Err(e) = self.atomic_replace(&tmp_path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }

        if let Some(parent) = self.parent() {
            sync_dir(parent)?;
        }

        Ok(())
    }

    fn parent(&self) -> Option<&Path> {
        self.path.parent().filter(|p| !p.as_os_str().is_empty())
    }

    /// Sibling path `<name>.tmp.<16 hex chars>`.
    fn random_tmp_path(&self) -> Result<PathBuf, StorageError> {
        let mut buf = [0u8; 8];
        fill(&mut buf).map_err(|e| StorageError::Backend(format!("random: {e}")))?;

        let suffix: String = buf.iter().map(|b| format!("{b:02x}")).collect();
        let file_name = self
            .path
            .file_name()
            .ok_or_else(|| StorageError::Backend(format!("{} is not a file path", self.path.display())))?
            .to_string_lossy();

        Ok(self.path.with_file_name(format!("{file_name}.tmp.{suffix}")))
    }

    #[cfg(target_os = "windows")]
    fn atomic_replace(&self, tmp_path: &Path) -> io::Result<()> {
        use std::ffi::OsStr;
        use std::os::windows::ffi::OsStrExt;
        use windows_sys::Win32::Storage::FileSystem::{
            MOVEFILE_REPLACE_EXISTING, MOVEFILE_WRITE_THROUGH, MoveFileExW,
        };

        fn to_wide(s: &OsStr) -> Vec<u16> {
            s.encode_wide().chain(std::iter::once(0)).collect()
        }

        let target_w = to_wide(self.path.as_os_str());
        let tmp_w = to_wide(tmp_path.as_os_str());

        // SAFETY: both buffers are null-terminated UTF-16 and outlive the call.
        let result = unsafe {
            MoveFileExW(
                tmp_w.as_ptr(),
                target_w.as_ptr(),
                MOVEFILE_REPLACE_EXISTING | MOVEFILE_WRITE_THROUGH,
            )
        };

        if result == 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// `rename()` is atomic within one filesystem.
    #[cfg(not(target_os = "windows"))]
    fn atomic_replace(&self, tmp_path: &Path) -> io::Result<()> {
        fs::rename(tmp_path, &self.path)
    }
}

#[cfg(not(target_os = "windows"))]
fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

// Directories cannot be opened as files on Windows; MOVEFILE_WRITE_THROUGH
// already flushed the rename.
#[cfg(target_os = "windows")]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}
