//! Encrypted, portable export and import of the whole note collection.

use std::path::PathBuf;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::crypto::{self, CipherSuite, KEY_LEN, KdfParams, SALT_LEN};
use crate::error::VaultError;
use crate::format::VaultArchive;
use crate::model::Snapshot;
use crate::repository::NoteRepository;
use crate::storage::AtomicFile;
use crate::store::NoteStore;

/// Serializes imports so a restore is never interleaved with another.
static IMPORT_LOCK: Mutex<()> = Mutex::const_new(());

/// What an import put back into durable storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub folders: usize,
    pub notes: usize,
    pub reminders: usize,
}

impl ImportSummary {
    fn of(snapshot: &Snapshot) -> Self {
        Self {
            folders: snapshot.folders.len(),
            notes: snapshot.notes.len(),
            reminders: snapshot.reminders.len(),
        }
    }
}

/// Seals snapshots into vault archives and opens them again.
#[derive(Debug, Clone, Copy)]
pub struct Vault {
    kdf: KdfParams,
    suite: CipherSuite,
}

impl Default for Vault {
    fn default() -> Self {
        Self::new()
    }
}

impl Vault {
    /// Moderate Argon2id profile and the process's preferred cipher.
    pub fn new() -> Self {
        Self {
            kdf: KdfParams::moderate(),
            suite: CipherSuite::preferred(),
        }
    }

    pub fn with_kdf(self, kdf: KdfParams) -> Self {
        Self { kdf, ..self }
    }

    /// Cipher used for new archives. Imports use whatever the archive
    /// records.
    pub fn with_cipher(self, suite: CipherSuite) -> Self {
        Self { suite, ..self }
    }

    pub fn kdf(&self) -> KdfParams {
        self.kdf
    }

    pub fn cipher(&self) -> CipherSuite {
        self.suite
    }

    /// Encrypts `plaintext` under a key derived from `passphrase` and a fresh
    /// salt, and packs the result into archive bytes.
    pub async fn seal(
        &self,
        passphrase: Zeroizing<String>,
        plaintext: &[u8],
    ) -> Result<Vec<u8>, VaultError> {
        let salt = crypto::generate_salt()?;
        let key = derive(passphrase, salt, self.kdf).await?;

        let (ciphertext, nonce) = crypto::encrypt(self.suite, &key, plaintext)?;
        VaultArchive::new(self.suite, salt, nonce, ciphertext)?.pack()
    }

    /// Unpacks archive bytes and decrypts them.
    ///
    /// The archive is checked structurally before any key derivation.
    pub async fn open(
        &self,
        passphrase: Zeroizing<String>,
        archive: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, VaultError> {
        let archive = VaultArchive::unpack(archive)?;
        debug!(suite = %archive.suite(), bytes = archive.ciphertext().len(), "archive unpacked");

        let key = derive(passphrase, *archive.salt(), self.kdf).await?;
        crypto::decrypt(archive.suite(), &key, archive.nonce(), archive.ciphertext())
    }

    /// Seals everything durable storage holds.
    pub async fn export<R: NoteRepository>(
        &self,
        store: &NoteStore<R>,
        passphrase: Zeroizing<String>,
    ) -> Result<Vec<u8>, VaultError> {
        let snapshot = store.repository().dump_all().await?;
        let summary = ImportSummary::of(&snapshot);
        let plaintext = Zeroizing::new(serde_json::to_vec(&snapshot)?);
        drop(snapshot);

        let bytes = self.seal(passphrase, &plaintext).await?;
        info!(
            suite = %self.suite,
            folders = summary.folders,
            notes = summary.notes,
            bytes = bytes.len(),
            "vault exported"
        );
        Ok(bytes)
    }

    /// Exports into `dest` and returns the number of bytes written.
    pub async fn export_to<R, W>(
        &self,
        store: &NoteStore<R>,
        passphrase: Zeroizing<String>,
        dest: &mut W,
    ) -> Result<usize, VaultError>
    where
        R: NoteRepository,
        W: AsyncWrite + Unpin,
    {
        let bytes = self.export(store, passphrase).await?;
        dest.write_all(&bytes).await?;
        dest.flush().await?;
        Ok(bytes.len())
    }

    /// Exports to a file, replacing it atomically.
    pub async fn export_to_path<R: NoteRepository>(
        &self,
        store: &NoteStore<R>,
        passphrase: Zeroizing<String>,
        path: impl Into<PathBuf>,
    ) -> Result<usize, VaultError> {
        let bytes = self.export(store, passphrase).await?;
        let len = bytes.len();
        let file = AtomicFile::new(path);

        tokio::task::spawn_blocking(move || file.write(&bytes))
            .await
            .map_err(|e| VaultError::Io(std::io::Error::other(e)))??;
        Ok(len)
    }

    /// Replaces durable storage with the archive's snapshot and refreshes
    /// `store` from it.
    ///
    /// Nothing is written unless the archive decrypts, parses and validates.
    pub async fn import<R: NoteRepository>(
        &self,
        store: &mut NoteStore<R>,
        passphrase: Zeroizing<String>,
        archive: &[u8],
    ) -> Result<ImportSummary, VaultError> {
        let _guard = IMPORT_LOCK.lock().await;

        let plaintext = self.open(passphrase, archive).await.inspect_err(|e| {
            warn!(error = %e, "vault could not be opened");
        })?;
        let snapshot: Snapshot = serde_json::from_slice(&plaintext)?;
        drop(plaintext);
        snapshot.validate().map_err(VaultError::InvalidSnapshot)?;

        let summary = ImportSummary::of(&snapshot);
        store.repository().restore_all(snapshot).await?;
        store.refresh().await?;

        info!(
            folders = summary.folders,
            notes = summary.notes,
            reminders = summary.reminders,
            "vault imported"
        );
        Ok(summary)
    }

    /// Reads archive bytes from `src` to the end and imports them.
    pub async fn import_from<R, Rd>(
        &self,
        store: &mut NoteStore<R>,
        passphrase: Zeroizing<String>,
        src: &mut Rd,
    ) -> Result<ImportSummary, VaultError>
    where
        R: NoteRepository,
        Rd: AsyncRead + Unpin,
    {
        let mut archive = Vec::new();
        src.read_to_end(&mut archive).await?;
        self.import(store, passphrase, &archive).await
    }
}

/// Runs Argon2id off the async executor. The passphrase is dropped, and
/// wiped, as soon as the key exists.
async fn derive(
    passphrase: Zeroizing<String>,
    salt: [u8; SALT_LEN],
    kdf: KdfParams,
) -> Result<Zeroizing<[u8; KEY_LEN]>, VaultError> {
    tokio::task::spawn_blocking(move || crypto::derive_key(&passphrase, &salt, kdf))
        .await
        .map_err(|e| VaultError::KeyDerivation(format!("derivation task failed: {e}")))?
}
