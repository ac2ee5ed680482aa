use thiserror::Error;

/// Failures of the durable-storage collaborator.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("folder {0} not found")]
    FolderNotFound(i64),

    #[error("note {0} not found")]
    NoteNotFound(i64),

    #[error("folder name must not be empty")]
    InvalidFolderName,

    #[error("a folder named '{0}' already exists")]
    DuplicateFolderName(String),

    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("stored document is malformed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage backend failed: {0}")]
    Backend(String),
}

/// Failures of vault export and import.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// Wrong passphrase and tampered data are reported identically.
    #[error("invalid passphrase or corrupted vault")]
    Integrity,

    #[error("malformed vault archive: {0}")]
    Format(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("snapshot encoding failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("vault snapshot is inconsistent: {0}")]
    InvalidSnapshot(String),

    #[error("encryption failed")]
    Encryption,

    #[error("OS random generator unavailable")]
    Random,

    #[error("vault I/O failed: {0}")]
    Io(#[from] std::io::Error),
}
