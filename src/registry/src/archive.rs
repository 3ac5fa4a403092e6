//! Chart packaging: the archiver capability and the shipped tar.gz codec.
//!
//! The registry core only ever converts charts to and from bytes through
//! the [`ChartArchiver`] trait. [`TarGzArchiver`] is the default
//! implementation: a gzipped tar with the chart layout
//! (`<name>/Chart.yaml` plus `<name>/<file>` entries). Archives are
//! byte-deterministic (fixed entry order, zeroed timestamps, fixed
//! modes), so packing the same chart twice yields the same digest.

use std::io::Read;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use chartcask_core::{CaskError, Chart, Metadata, Result};

/// Chart to/from tarball conversion capability.
///
/// Round-trip identity is required at the chart level:
/// `unpack(pack(c)) == c`.
pub trait ChartArchiver: Send + Sync {
    /// Produce the compressed archive for a chart.
    fn pack(&self, chart: &Chart) -> Result<Vec<u8>>;

    /// Reconstruct a chart from its compressed archive.
    fn unpack(&self, bytes: &[u8]) -> Result<Chart>;
}

const METADATA_FILE: &str = "Chart.yaml";

/// Deterministic gzipped-tar chart archiver.
#[derive(Debug, Default, Clone, Copy)]
pub struct TarGzArchiver;

impl ChartArchiver for TarGzArchiver {
    fn pack(&self, chart: &Chart) -> Result<Vec<u8>> {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);

        let metadata_yaml = serde_yaml::to_string(&chart.metadata)?;
        append_entry(
            &mut builder,
            &format!("{}/{METADATA_FILE}", chart.name()),
            metadata_yaml.as_bytes(),
        )?;

        // BTreeMap iteration keeps entry order stable across packs.
        for (path, data) in &chart.files {
            append_entry(&mut builder, &format!("{}/{path}", chart.name()), data)?;
        }

        let encoder = builder
            .into_inner()
            .map_err(|e| CaskError::Archive(format!("failed to finish archive: {e}")))?;
        encoder
            .finish()
            .map_err(|e| CaskError::Archive(format!("failed to finish compression: {e}")))
    }

    fn unpack(&self, bytes: &[u8]) -> Result<Chart> {
        let mut archive = tar::Archive::new(GzDecoder::new(bytes));

        let mut metadata: Option<Metadata> = None;
        let mut files = std::collections::BTreeMap::new();

        let entries = archive
            .entries()
            .map_err(|e| CaskError::Archive(format!("unreadable archive: {e}")))?;
        for entry in entries {
            let mut entry =
                entry.map_err(|e| CaskError::Archive(format!("unreadable entry: {e}")))?;
            if !entry.header().entry_type().is_file() {
                continue;
            }

            let path = entry
                .path()
                .map_err(|e| CaskError::Archive(format!("bad entry path: {e}")))?
                .to_string_lossy()
                .into_owned();

            // Entries are rooted at "<chart name>/"; everything after the
            // first component is the chart-relative path.
            let relative = match path.split_once('/') {
                Some((_, rest)) if !rest.is_empty() => rest.to_string(),
                _ => continue,
            };

            let mut data = Vec::with_capacity(entry.size() as usize);
            entry
                .read_to_end(&mut data)
                .map_err(|e| CaskError::Archive(format!("unreadable entry {relative:?}: {e}")))?;

            if relative == METADATA_FILE {
                metadata = Some(serde_yaml::from_slice(&data)?);
            } else {
                files.insert(relative, data);
            }
        }

        let metadata = metadata.ok_or_else(|| {
            CaskError::Archive(format!("archive does not contain a {METADATA_FILE}"))
        })?;

        Ok(Chart { metadata, files })
    }
}

fn append_entry<W: std::io::Write>(
    builder: &mut tar::Builder<W>,
    path: &str,
    data: &[u8],
) -> Result<()> {
    let mut header = tar::Header::new_gnu();
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(0);
    header.set_cksum();
    builder
        .append_data(&mut header, path, data)
        .map_err(|e| CaskError::Archive(format!("failed to append {path:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chart() -> Chart {
        let mut c = Chart::new("mychart", "0.1.0")
            .with_file("values.yaml", b"replicas: 2".to_vec())
            .with_file("templates/deployment.yaml", b"kind: Deployment".to_vec());
        c.metadata.description = Some("a test chart".to_string());
        c
    }

    #[test]
    fn test_round_trip_identity() {
        let original = chart();
        let bytes = TarGzArchiver.pack(&original).unwrap();
        let restored = TarGzArchiver.unpack(&bytes).unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn test_pack_is_deterministic() {
        let c = chart();
        let a = TarGzArchiver.pack(&c).unwrap();
        let b = TarGzArchiver.pack(&c).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_pack_produces_gzip() {
        let bytes = TarGzArchiver.pack(&chart()).unwrap();
        assert_eq!(&bytes[..2], &[0x1f, 0x8b]);
    }

    #[test]
    fn test_unpack_empty_chart() {
        let original = Chart::new("empty", "1.0.0");
        let bytes = TarGzArchiver.pack(&original).unwrap();
        let restored = TarGzArchiver.unpack(&bytes).unwrap();
        assert_eq!(restored.metadata, original.metadata);
        assert!(restored.files.is_empty());
    }

    #[test]
    fn test_unpack_rejects_garbage() {
        assert!(matches!(
            TarGzArchiver.unpack(b"definitely not a tarball"),
            Err(CaskError::Archive(_))
        ));
    }

    #[test]
    fn test_unpack_requires_metadata() {
        // A valid archive with no Chart.yaml entry.
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        append_entry(&mut builder, "mychart/values.yaml", b"x: 1").unwrap();
        let bytes = builder.into_inner().unwrap().finish().unwrap();

        let err = TarGzArchiver.unpack(&bytes).unwrap_err();
        match err {
            CaskError::Archive(reason) => assert!(reason.contains("Chart.yaml")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_metadata_survives_yaml_round_trip() {
        let mut c = Chart::new("meta", "2.0.0");
        c.metadata.api_version = Some("v2".to_string());
        c.metadata.app_version = Some("1.16.0".to_string());
        let restored = TarGzArchiver.unpack(&TarGzArchiver.pack(&c).unwrap()).unwrap();
        assert_eq!(restored.metadata, c.metadata);
    }
}
