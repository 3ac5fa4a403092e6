//! Chart model: the versioned application package this library moves around.
//!
//! A chart is opaque to the registry core. The cache and client only ever
//! touch `Metadata` (name and version drive listings and the config blob)
//! and hand the whole value to a `ChartArchiver` for byte conversion.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Chart metadata, serialized as the config blob and as `Chart.yaml`
/// inside the packaged archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Chart name (e.g., "alpine")
    pub name: String,
    /// Chart version (e.g., "0.2.0")
    pub version: String,
    /// One-line description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Chart format API version
    #[serde(rename = "apiVersion", skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    /// Version of the application the chart deploys
    #[serde(rename = "appVersion", skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
}

impl Metadata {
    /// Create metadata with just a name and version.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: None,
            api_version: None,
            app_version: None,
        }
    }
}

/// A chart: metadata plus its template/value files.
///
/// `files` maps archive-relative paths (e.g., "templates/deployment.yaml")
/// to raw bytes. A `BTreeMap` keeps iteration order stable so packaging
/// the same chart twice produces identical archives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chart {
    pub metadata: Metadata,
    pub files: BTreeMap<String, Vec<u8>>,
}

impl Chart {
    /// Create an empty chart with the given name and version.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            metadata: Metadata::new(name, version),
            files: BTreeMap::new(),
        }
    }

    /// Add a file to the chart, replacing any existing entry at that path.
    pub fn with_file(mut self, path: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        self.files.insert(path.into(), data.into());
        self
    }

    /// Chart name shortcut.
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Chart version shortcut.
    pub fn version(&self) -> &str {
        &self.metadata.version
    }
}
