//! OCI image manifest assembly for chart artifacts.
//!
//! A chart maps onto three blobs: its metadata as the config, the
//! packaged archive as the single content layer, and the manifest tying
//! them together. Serialization is canonical (struct field order, sorted
//! annotation maps), so equivalent charts always produce identical
//! digests.

use serde::{Deserialize, Serialize};

use chartcask_core::{CaskError, Chart, Result};

use crate::archive::ChartArchiver;
use crate::descriptor::Descriptor;

/// Media type of the chart metadata config blob.
pub const CONFIG_MEDIA_TYPE: &str = "application/vnd.cncf.helm.config.v1+json";

/// Media type of the packaged chart content layer.
pub const CHART_CONTENT_MEDIA_TYPE: &str = "application/vnd.cncf.helm.chart.content.v1.tar+gzip";

/// Media type of the image manifest itself.
pub const MANIFEST_MEDIA_TYPE: &str = "application/vnd.oci.image.manifest.v1+json";

/// Media types a puller will accept.
pub fn known_media_types() -> [&'static str; 3] {
    [
        CONFIG_MEDIA_TYPE,
        CHART_CONTENT_MEDIA_TYPE,
        MANIFEST_MEDIA_TYPE,
    ]
}

/// OCI image manifest binding a config to its layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(rename = "schemaVersion")]
    pub schema_version: u32,
    pub config: Descriptor,
    pub layers: Vec<Descriptor>,
}

impl Manifest {
    /// Build a schema-2 manifest for a config and one content layer.
    pub fn new(config: Descriptor, layer: Descriptor) -> Self {
        Self {
            schema_version: 2,
            config,
            layers: vec![layer],
        }
    }
}

/// Everything produced by packing one chart: descriptor + payload for
/// the config, content layer, and manifest.
#[derive(Debug)]
pub struct PackedChart {
    pub config: Descriptor,
    pub config_bytes: Vec<u8>,
    pub layer: Descriptor,
    pub layer_bytes: Vec<u8>,
    pub manifest: Descriptor,
    pub manifest_bytes: Vec<u8>,
}

/// Convert a chart into its three blob payloads.
pub fn pack(chart: &Chart, archiver: &dyn ChartArchiver) -> Result<PackedChart> {
    let config_bytes = serde_json::to_vec(&chart.metadata)?;
    let config = Descriptor::from_bytes(CONFIG_MEDIA_TYPE, &config_bytes);

    let layer_bytes = archiver.pack(chart)?;
    let layer = Descriptor::from_bytes(CHART_CONTENT_MEDIA_TYPE, &layer_bytes);

    let manifest_bytes = serde_json::to_vec(&Manifest::new(config.clone(), layer.clone()))?;
    let manifest = Descriptor::from_bytes(MANIFEST_MEDIA_TYPE, &manifest_bytes);

    Ok(PackedChart {
        config,
        config_bytes,
        layer,
        layer_bytes,
        manifest,
        manifest_bytes,
    })
}

/// Parse and validate raw manifest bytes.
///
/// Returns the config descriptor and the single chart content layer.
pub fn unpack(manifest_bytes: &[u8]) -> Result<(Descriptor, Descriptor)> {
    let manifest: Manifest = serde_json::from_slice(manifest_bytes)
        .map_err(|e| CaskError::MalformedManifest(format!("unparseable manifest: {e}")))?;

    if manifest.schema_version != 2 {
        return Err(CaskError::MalformedManifest(format!(
            "unsupported schema version {}",
            manifest.schema_version
        )));
    }

    if manifest.layers.len() != 1 {
        return Err(CaskError::MalformedManifest(format!(
            "manifest does not contain exactly 1 layer (found {})",
            manifest.layers.len()
        )));
    }

    let layer = manifest.layers.into_iter().next().ok_or_else(|| {
        CaskError::MalformedManifest("manifest does not contain exactly 1 layer (found 0)".to_string())
    })?;
    if layer.media_type != CHART_CONTENT_MEDIA_TYPE {
        return Err(CaskError::MalformedManifest(format!(
            "unexpected layer media type {:?}",
            layer.media_type
        )));
    }

    if layer.size == 0 {
        return Err(CaskError::MalformedManifest(
            "manifest does not contain a valid chart content layer".to_string(),
        ));
    }

    Ok((manifest.config, layer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::TarGzArchiver;
    use crate::digest::Digest;

    fn chart() -> Chart {
        Chart::new("alpine", "0.2.0").with_file("values.yaml", b"replicas: 1".to_vec())
    }

    #[test]
    fn test_pack_descriptor_integrity() {
        let packed = pack(&chart(), &TarGzArchiver).unwrap();

        assert_eq!(packed.config.media_type, CONFIG_MEDIA_TYPE);
        assert_eq!(packed.layer.media_type, CHART_CONTENT_MEDIA_TYPE);
        assert_eq!(packed.manifest.media_type, MANIFEST_MEDIA_TYPE);

        assert_eq!(packed.config.digest, Digest::from_bytes(&packed.config_bytes));
        assert_eq!(packed.layer.digest, Digest::from_bytes(&packed.layer_bytes));
        assert_eq!(
            packed.manifest.digest,
            Digest::from_bytes(&packed.manifest_bytes)
        );
        assert_eq!(packed.config.size, packed.config_bytes.len() as u64);
    }

    #[test]
    fn test_pack_is_deterministic() {
        let a = pack(&chart(), &TarGzArchiver).unwrap();
        let b = pack(&chart(), &TarGzArchiver).unwrap();
        assert_eq!(a.manifest.digest, b.manifest.digest);
        assert_eq!(a.layer.digest, b.layer.digest);
        assert_eq!(a.config.digest, b.config.digest);
    }

    #[test]
    fn test_pack_then_unpack() {
        let packed = pack(&chart(), &TarGzArchiver).unwrap();
        let (config, layer) = unpack(&packed.manifest_bytes).unwrap();
        assert_eq!(config, packed.config);
        assert_eq!(layer, packed.layer);
    }

    #[test]
    fn test_unpack_rejects_wrong_schema_version() {
        let packed = pack(&chart(), &TarGzArchiver).unwrap();
        let mut value: serde_json::Value = serde_json::from_slice(&packed.manifest_bytes).unwrap();
        value["schemaVersion"] = serde_json::json!(1);
        let err = unpack(&serde_json::to_vec(&value).unwrap()).unwrap_err();
        match err {
            CaskError::MalformedManifest(reason) => assert!(reason.contains("schema version")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unpack_rejects_extra_layers() {
        let packed = pack(&chart(), &TarGzArchiver).unwrap();
        let mut value: serde_json::Value = serde_json::from_slice(&packed.manifest_bytes).unwrap();
        let layer = value["layers"][0].clone();
        value["layers"].as_array_mut().unwrap().push(layer);
        let err = unpack(&serde_json::to_vec(&value).unwrap()).unwrap_err();
        match err {
            CaskError::MalformedManifest(reason) => assert!(reason.contains("exactly 1 layer")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unpack_rejects_wrong_layer_media_type() {
        let packed = pack(&chart(), &TarGzArchiver).unwrap();
        let mut value: serde_json::Value = serde_json::from_slice(&packed.manifest_bytes).unwrap();
        value["layers"][0]["mediaType"] =
            serde_json::json!("application/vnd.oci.image.layer.v1.tar+gzip");
        let err = unpack(&serde_json::to_vec(&value).unwrap()).unwrap_err();
        match err {
            CaskError::MalformedManifest(reason) => assert!(reason.contains("media type")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unpack_rejects_empty_layer() {
        let packed = pack(&chart(), &TarGzArchiver).unwrap();
        let mut value: serde_json::Value = serde_json::from_slice(&packed.manifest_bytes).unwrap();
        value["layers"][0]["size"] = serde_json::json!(0);
        assert!(matches!(
            unpack(&serde_json::to_vec(&value).unwrap()),
            Err(CaskError::MalformedManifest(_))
        ));
    }

    #[test]
    fn test_unpack_rejects_garbage() {
        assert!(matches!(
            unpack(b"not a manifest"),
            Err(CaskError::MalformedManifest(_))
        ));
    }
}
