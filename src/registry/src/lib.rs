//! OCI registry client and content-addressable chart cache.
//!
//! This crate stores, inspects, publishes, and retrieves charts using an
//! OCI image registry as the remote transport. Locally, charts live in a
//! standard OCI Image Layout any OCI-aware tool can read:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Chart Cache Layout                      │
//! │                                                              │
//! │  <root>/                                                     │
//! │  ├── oci-layout           (layout version marker)            │
//! │  ├── index.json           (ref → manifest descriptor)        │
//! │  └── blobs/                                                  │
//! │      └── sha256/                                             │
//! │          ├── <manifest>   (config + one content layer)       │
//! │          ├── <config>     (chart metadata, JSON)             │
//! │          └── <content>    (packaged chart, tar+gzip)         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Blobs are content-addressed by SHA-256 and written once; `index.json`
//! is replaced atomically, so a ref observed in the index always resolves
//! to complete blobs. Remote transport and chart packaging are
//! capabilities ([`RemoteResolver`], [`ChartArchiver`]) the caller can
//! substitute.

pub mod archive;
pub mod blob;
pub mod cache;
pub mod client;
pub mod credentials;
pub mod descriptor;
pub mod digest;
pub mod index;
pub mod manifest;
pub mod memory;
pub mod output;
pub mod reference;
pub mod remote;

pub use archive::{ChartArchiver, TarGzArchiver};
pub use blob::{BlobStat, BlobStore};
pub use cache::{CacheEntry, ChartCache, ChartLayers, FetchedChart};
pub use client::{ClientOptions, RegistryClient};
pub use credentials::CredentialStore;
pub use descriptor::{Descriptor, REF_NAME_ANNOTATION};
pub use digest::Digest;
pub use index::Index;
pub use manifest::{
    Manifest, PackedChart, CHART_CONTENT_MEDIA_TYPE, CONFIG_MEDIA_TYPE, MANIFEST_MEDIA_TYPE,
};
pub use memory::MemoryRegistry;
pub use reference::Reference;
pub use remote::{Authenticator, ChartPuller, ChartPusher, PushOutcome, RemoteResolver};
