//! The local chart cache: composition of blob store, index, manifest
//! assembler, and archiver.
//!
//! Every mutating operation is append-then-save: blob writes complete
//! before the single `Index::save` call, so a crash at any point leaves
//! at worst unreferenced blobs (benign) and never a dangling index
//! entry.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use chartcask_core::{CaskError, Chart, Metadata, Result};

use crate::archive::ChartArchiver;
use crate::blob::BlobStore;
use crate::descriptor::Descriptor;
use crate::digest::Digest;
use crate::index::Index;
use crate::manifest::{self, Manifest, MANIFEST_MEDIA_TYPE};
use crate::reference::Reference;

/// Summary of one cached chart.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub reference: Reference,
    /// Chart name from the config blob
    pub name: String,
    /// Chart version from the config blob
    pub version: String,
    pub manifest_digest: Digest,
    pub config_digest: Digest,
    /// Digest of the chart content layer
    pub content_digest: Digest,
    /// Content layer size in bytes
    pub size: u64,
    /// Content layer file mtime; listings only, never correctness
    pub created: Option<DateTime<Utc>>,
}

/// A chart fetched from the cache together with its summary.
#[derive(Debug)]
pub struct FetchedChart {
    pub chart: Chart,
    pub entry: CacheEntry,
}

/// Everything the push path needs to transmit a cached chart.
#[derive(Debug)]
pub struct ChartLayers {
    pub manifest: Descriptor,
    pub manifest_bytes: Vec<u8>,
    pub config: Descriptor,
    pub config_bytes: Vec<u8>,
    pub layer: Descriptor,
    pub layer_bytes: Vec<u8>,
}

/// Content-addressable chart cache over one root directory.
///
/// Single-writer discipline: callers serialize mutating operations
/// against the same root.
pub struct ChartCache {
    root: PathBuf,
    blobs: BlobStore,
    archiver: Arc<dyn ChartArchiver>,
}

impl ChartCache {
    /// Create a cache over a root directory. Nothing is written until
    /// the first store.
    pub fn new(root: impl AsRef<Path>, archiver: Arc<dyn ChartArchiver>) -> Self {
        let root = root.as_ref().to_path_buf();
        Self {
            blobs: BlobStore::new(&root),
            root,
            archiver,
        }
    }

    /// Cache root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Store a chart under a reference.
    ///
    /// Writes the config, content, and manifest blobs (skipping any that
    /// already exist), then updates and saves the index.
    pub fn store(&self, chart: &Chart, reference: &Reference) -> Result<CacheEntry> {
        let packed = manifest::pack(chart, self.archiver.as_ref())?;

        self.blobs.put(&packed.config_bytes)?;
        self.blobs.put(&packed.layer_bytes)?;
        self.blobs.put(&packed.manifest_bytes)?;

        let mut index = Index::load(&self.root)?;
        index.upsert(reference, packed.manifest.clone());
        index.save()?;

        let created = self.blobs.stat(&packed.layer.digest).ok().map(|s| s.modified);

        tracing::debug!(
            reference = %reference,
            manifest = %packed.manifest.digest,
            "stored chart"
        );

        Ok(CacheEntry {
            reference: reference.clone(),
            name: chart.name().to_string(),
            version: chart.version().to_string(),
            manifest_digest: packed.manifest.digest,
            config_digest: packed.config.digest,
            content_digest: packed.layer.digest,
            size: packed.layer.size,
            created,
        })
    }

    /// Fetch a chart by reference.
    ///
    /// An absent reference is `Ok(None)`, not an error. The config blob
    /// is authoritative for the returned chart's metadata.
    pub fn fetch(&self, reference: &Reference) -> Result<Option<FetchedChart>> {
        let index = Index::load(&self.root)?;
        let descriptor = match index.find(reference) {
            Some(d) => d.clone(),
            None => return Ok(None),
        };

        let manifest_bytes = self.blobs.get(&descriptor.digest)?;
        let (config_desc, layer_desc) = manifest::unpack(&manifest_bytes)?;

        let layer_bytes = self.blobs.get(&layer_desc.digest)?;
        let mut chart = self.archiver.unpack(&layer_bytes)?;

        let config_bytes = self.blobs.get(&config_desc.digest)?;
        let metadata: Metadata = serde_json::from_slice(&config_bytes)?;
        chart.metadata = metadata;

        let stat = self.blobs.stat(&layer_desc.digest)?;

        let entry = CacheEntry {
            reference: reference.clone(),
            name: chart.name().to_string(),
            version: chart.version().to_string(),
            manifest_digest: descriptor.digest,
            config_digest: config_desc.digest,
            content_digest: layer_desc.digest,
            size: stat.size,
            created: Some(stat.modified),
        };

        Ok(Some(FetchedChart { chart, entry }))
    }

    /// Whether the index currently has an entry for a reference.
    pub fn contains(&self, reference: &Reference) -> Result<bool> {
        Ok(Index::load(&self.root)?.find(reference).is_some())
    }

    /// Remove a reference from the index. Blobs are retained.
    ///
    /// Returns the removed manifest descriptor, or `None` if the ref was
    /// not present (in which case the index is not rewritten).
    pub fn delete(&self, reference: &Reference) -> Result<Option<Descriptor>> {
        let mut index = Index::load(&self.root)?;
        let removed = index.delete(reference);
        if removed.is_some() {
            index.save()?;
            tracing::debug!(reference = %reference, "removed chart ref");
        }
        Ok(removed)
    }

    /// Summaries of all cached charts, sorted ascending by reference.
    ///
    /// Entries that fail to resolve (bad ref annotation, missing blob,
    /// malformed manifest) are logged and dropped.
    pub fn list(&self) -> Result<Vec<CacheEntry>> {
        let index = Index::load(&self.root)?;

        let mut entries = Vec::new();
        for descriptor in index.list() {
            let name = match descriptor.ref_name() {
                Some(name) if !name.is_empty() => name.to_string(),
                _ => continue,
            };
            match self.resolve_entry(&name, descriptor) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    tracing::warn!(reference = %name, error = %e, "skipping unresolvable cache entry");
                }
            }
        }

        entries.sort_by(|a, b| a.reference.full_name().cmp(&b.reference.full_name()));
        Ok(entries)
    }

    /// Load everything needed to push a cached chart.
    pub fn load_layers(&self, reference: &Reference) -> Result<ChartLayers> {
        let index = Index::load(&self.root)?;
        let descriptor = index
            .find(reference)
            .cloned()
            .ok_or_else(|| CaskError::RefNotFound(reference.full_name()))?;

        let manifest_bytes = self.require_blob(&descriptor.digest)?;
        let (config_desc, layer_desc) = manifest::unpack(&manifest_bytes)?;
        let config_bytes = self.require_blob(&config_desc.digest)?;
        let layer_bytes = self.require_blob(&layer_desc.digest)?;

        Ok(ChartLayers {
            manifest: Descriptor::from_bytes(MANIFEST_MEDIA_TYPE, &manifest_bytes),
            manifest_bytes,
            config: config_desc,
            config_bytes,
            layer: layer_desc,
            layer_bytes,
        })
    }

    /// Store pre-downloaded config and layer blobs under a reference.
    ///
    /// Used by the pull path. Each payload is verified against its
    /// descriptor before anything is written; the manifest is rebuilt
    /// deterministically from the two descriptors. Returns whether the
    /// content layer blob already existed.
    pub fn store_layers(
        &self,
        reference: &Reference,
        config: Descriptor,
        layer: Descriptor,
        config_bytes: &[u8],
        layer_bytes: &[u8],
    ) -> Result<bool> {
        verify_payload(&config, config_bytes)?;
        verify_payload(&layer, layer_bytes)?;
        if layer.media_type != manifest::CHART_CONTENT_MEDIA_TYPE {
            return Err(CaskError::MalformedManifest(format!(
                "unexpected layer media type {:?}",
                layer.media_type
            )));
        }

        let existed = self.blobs.contains(&layer.digest);

        self.blobs.put(config_bytes)?;
        self.blobs.put(layer_bytes)?;

        let manifest_bytes = serde_json::to_vec(&Manifest::new(config, layer))?;
        let manifest_desc = Descriptor::from_bytes(MANIFEST_MEDIA_TYPE, &manifest_bytes);
        self.blobs.put(&manifest_bytes)?;

        let mut index = Index::load(&self.root)?;
        index.upsert(reference, manifest_desc);
        index.save()?;

        Ok(existed)
    }

    /// Resolve one index descriptor into a listing entry.
    fn resolve_entry(&self, ref_name: &str, descriptor: &Descriptor) -> Result<CacheEntry> {
        let reference = Reference::parse(ref_name)?;

        let manifest_bytes = self.blobs.get(&descriptor.digest)?;
        let (config_desc, layer_desc) = manifest::unpack(&manifest_bytes)?;

        let config_bytes = self.blobs.get(&config_desc.digest)?;
        let metadata: Metadata = serde_json::from_slice(&config_bytes)?;

        let stat = self.blobs.stat(&layer_desc.digest)?;

        Ok(CacheEntry {
            reference,
            name: metadata.name,
            version: metadata.version,
            manifest_digest: descriptor.digest.clone(),
            config_digest: config_desc.digest,
            content_digest: layer_desc.digest,
            size: stat.size,
            created: Some(stat.modified),
        })
    }

    /// Read a blob the index claims to reference.
    fn require_blob(&self, digest: &Digest) -> Result<Vec<u8>> {
        match self.blobs.get(digest) {
            Ok(bytes) => Ok(bytes),
            Err(CaskError::BlobNotFound { digest }) => Err(CaskError::CorruptCache(format!(
                "index references missing blob sha256:{digest}"
            ))),
            Err(e) => Err(e),
        }
    }
}

/// Check a downloaded payload against its descriptor.
fn verify_payload(descriptor: &Descriptor, bytes: &[u8]) -> Result<()> {
    let actual = Digest::from_bytes(bytes);
    if actual != descriptor.digest {
        return Err(CaskError::DigestMismatch {
            expected: descriptor.digest.prefixed(),
            actual: actual.prefixed(),
        });
    }
    if bytes.len() as u64 != descriptor.size {
        return Err(CaskError::MalformedManifest(format!(
            "descriptor size {} does not match payload length {}",
            descriptor.size,
            bytes.len()
        )));
    }
    Ok(())
}
