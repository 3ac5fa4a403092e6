//! The remote transport seam.
//!
//! The registry core never talks HTTP itself. A [`RemoteResolver`] hands
//! out push and pull streams for a reference and owns authentication,
//! redirects, retries, and transport timeouts. Implementations live
//! outside the core; [`crate::memory::MemoryRegistry`] is the in-process
//! one used by the test suite.

use async_trait::async_trait;

use chartcask_core::Result;

use crate::descriptor::Descriptor;
use crate::reference::Reference;

/// Result of one upload. A blob the remote already holds is success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Uploaded,
    AlreadyExists,
}

/// Registry credential operations.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn login(&self, host: &str, username: &str, password: &str) -> Result<()>;
    async fn logout(&self, host: &str) -> Result<()>;
}

/// Upload stream for one reference.
///
/// Callers push children before parents: config and layer blobs first,
/// the manifest last.
#[async_trait]
pub trait ChartPusher: Send + Sync {
    /// Upload one blob.
    async fn push_blob(&self, descriptor: &Descriptor, bytes: &[u8]) -> Result<PushOutcome>;

    /// Upload the manifest and bind it to the reference's tag.
    async fn push_manifest(
        &self,
        reference: &Reference,
        descriptor: &Descriptor,
        bytes: &[u8],
    ) -> Result<PushOutcome>;
}

/// Download stream for one reference.
#[async_trait]
pub trait ChartPuller: Send + Sync {
    /// Resolve the reference's tag to its manifest descriptor.
    async fn resolve(&self, reference: &Reference) -> Result<Descriptor>;

    /// Fetch the payload a descriptor points at.
    async fn fetch(&self, descriptor: &Descriptor) -> Result<Vec<u8>>;
}

/// Factory for push/pull streams plus the authenticator.
pub trait RemoteResolver: Send + Sync {
    fn pusher(&self, reference: &Reference) -> Result<Box<dyn ChartPusher>>;
    fn puller(&self, reference: &Reference) -> Result<Box<dyn ChartPuller>>;
    fn authenticator(&self) -> &dyn Authenticator;
}
