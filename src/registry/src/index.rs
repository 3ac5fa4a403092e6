//! The OCI index: the cache's durable ref → manifest map.
//!
//! One `Index` instance is the in-memory view of `index.json` between
//! `load` and `save`. `save` is the only durability point: it writes the
//! `oci-layout` marker on first use and replaces `index.json` atomically
//! (temp file, fsync, rename), so a crash never leaves a half-written
//! index.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use chartcask_core::{CaskError, Result};

use crate::descriptor::Descriptor;
use crate::reference::Reference;

/// File name of the OCI index.
pub const INDEX_FILE: &str = "index.json";

/// File name of the OCI layout marker.
pub const OCI_LAYOUT_FILE: &str = "oci-layout";

/// Version recorded in the `oci-layout` marker.
pub const OCI_LAYOUT_VERSION: &str = "1.0.0";

/// Serialized form of `index.json`.
#[derive(Debug, Serialize, Deserialize)]
struct ImageIndex {
    #[serde(rename = "schemaVersion")]
    schema_version: u32,
    manifests: Vec<Descriptor>,
}

/// Serialized form of the `oci-layout` marker file.
#[derive(Debug, Serialize, Deserialize)]
struct OciLayout {
    #[serde(rename = "imageLayoutVersion")]
    image_layout_version: String,
}

/// In-memory view of the OCI index for one cache root.
#[derive(Debug)]
pub struct Index {
    root: PathBuf,
    inner: ImageIndex,
}

impl Index {
    /// Load `index.json` from a cache root, or start empty if the file
    /// does not exist. A missing `oci-layout` marker is tolerated.
    pub fn load(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let path = root.join(INDEX_FILE);

        let inner = match std::fs::read(&path) {
            Ok(raw) => serde_json::from_slice(&raw).map_err(|e| {
                CaskError::CorruptCache(format!("unreadable {INDEX_FILE}: {e}"))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => ImageIndex {
                schema_version: 2,
                manifests: Vec::new(),
            },
            Err(e) => return Err(e.into()),
        };

        Ok(Self { root, inner })
    }

    /// Insert or replace the entry for a reference.
    ///
    /// The descriptor is annotated with the ref name. An existing entry
    /// for the same ref is replaced in place, preserving its position;
    /// otherwise the entry is appended. A ref never appears twice.
    pub fn upsert(&mut self, reference: &Reference, descriptor: Descriptor) {
        let descriptor = descriptor.with_ref_name(reference);
        let name = reference.full_name();
        match self
            .inner
            .manifests
            .iter_mut()
            .find(|m| m.ref_name() == Some(name.as_str()))
        {
            Some(slot) => *slot = descriptor,
            None => self.inner.manifests.push(descriptor),
        }
    }

    /// Look up the manifest descriptor for a reference.
    pub fn find(&self, reference: &Reference) -> Option<&Descriptor> {
        let name = reference.full_name();
        self.inner
            .manifests
            .iter()
            .find(|m| m.ref_name() == Some(name.as_str()))
    }

    /// Remove the entry for a reference, returning the prior descriptor.
    pub fn delete(&mut self, reference: &Reference) -> Option<Descriptor> {
        let name = reference.full_name();
        let pos = self
            .inner
            .manifests
            .iter()
            .position(|m| m.ref_name() == Some(name.as_str()))?;
        Some(self.inner.manifests.remove(pos))
    }

    /// Snapshot of all entries in storage order.
    pub fn list(&self) -> &[Descriptor] {
        &self.inner.manifests
    }

    /// Persist the index.
    ///
    /// Writes the `oci-layout` marker if it is missing, then replaces
    /// `index.json` atomically.
    pub fn save(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;

        let layout_path = self.root.join(OCI_LAYOUT_FILE);
        if !layout_path.exists() {
            let layout = OciLayout {
                image_layout_version: OCI_LAYOUT_VERSION.to_string(),
            };
            write_atomic(&self.root, &layout_path, &serde_json::to_vec(&layout)?)?;
        }

        let raw = serde_json::to_vec(&self.inner)?;
        write_atomic(&self.root, &self.root.join(INDEX_FILE), &raw)?;

        tracing::debug!(
            entries = self.inner.manifests.len(),
            path = %self.root.display(),
            "saved index"
        );
        Ok(())
    }
}

/// Write a file via a temp file in the same directory, fsync, rename.
fn write_atomic(dir: &Path, path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| CaskError::Io(e.error))?;
    Ok(())
}
