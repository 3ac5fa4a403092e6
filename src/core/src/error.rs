use thiserror::Error;

/// Chartcask error types.
///
/// Each variant is a stable error kind; callers match on the variant to
/// decide exit codes. The library recovers nothing on its own.
#[derive(Error, Debug)]
pub enum CaskError {
    /// Reference is syntactically invalid, or the tag is missing where required
    #[error("invalid chart reference: {0:?}")]
    InvalidReference(String),

    /// No index entry for the reference
    #[error("ref not found: {0}")]
    RefNotFound(String),

    /// A digest referenced by the index has no blob file
    #[error("blob not found: sha256:{digest}")]
    BlobNotFound { digest: String },

    /// Manifest failed validation
    #[error("malformed manifest: {0}")]
    MalformedManifest(String),

    /// Downloaded bytes do not match the advertised digest
    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    /// Index references content the blob store cannot produce
    #[error("corrupt cache: {0}")]
    CorruptCache(String),

    /// Error surfaced by the remote resolver
    #[error("remote registry error: {0}")]
    Remote(String),

    /// Chart archiver failure
    #[error("chart archive error: {0}")]
    Archive(String),

    /// Operation aborted by its cancellation token
    #[error("operation cancelled")]
    Cancelled,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for CaskError {
    fn from(err: serde_json::Error) -> Self {
        CaskError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for CaskError {
    fn from(err: serde_yaml::Error) -> Self {
        CaskError::Serialization(err.to_string())
    }
}

/// Result type alias for chartcask operations.
pub type Result<T> = std::result::Result<T, CaskError>;
