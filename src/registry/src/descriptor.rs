//! OCI content descriptors.
//!
//! A descriptor is a typed pointer to a blob: media type, digest, size,
//! and an optional annotation map. Polymorphism across artifact kinds is
//! carried by the media-type string, not by distinct types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::digest::Digest;
use crate::reference::Reference;

/// Annotation key binding an index entry to a chart reference.
pub const REF_NAME_ANNOTATION: &str = "org.opencontainers.image.ref.name";

/// Typed pointer to a blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
    #[serde(rename = "mediaType")]
    pub media_type: String,
    pub digest: Digest,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,
}

impl Descriptor {
    /// Build a descriptor for a byte payload, computing digest and size.
    pub fn from_bytes(media_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            media_type: media_type.into(),
            digest: Digest::from_bytes(bytes),
            size: bytes.len() as u64,
            annotations: None,
        }
    }

    /// Copy of this descriptor annotated with the ref name.
    pub fn with_ref_name(mut self, reference: &Reference) -> Self {
        self.annotations
            .get_or_insert_with(BTreeMap::new)
            .insert(REF_NAME_ANNOTATION.to_string(), reference.full_name());
        self
    }

    /// The `org.opencontainers.image.ref.name` annotation, if present.
    pub fn ref_name(&self) -> Option<&str> {
        self.annotations
            .as_ref()
            .and_then(|a| a.get(REF_NAME_ANNOTATION))
            .map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_bytes() {
        let d = Descriptor::from_bytes("application/octet-stream", b"hello");
        assert_eq!(d.size, 5);
        assert_eq!(d.digest, Digest::from_bytes(b"hello"));
        assert!(d.annotations.is_none());
    }

    #[test]
    fn test_ref_name_annotation() {
        let r = Reference::parse("localhost:5000/alpine:0.2.0").unwrap();
        let d = Descriptor::from_bytes("application/octet-stream", b"x").with_ref_name(&r);
        assert_eq!(d.ref_name(), Some("localhost:5000/alpine:0.2.0"));
    }

    #[test]
    fn test_json_shape() {
        let d = Descriptor::from_bytes("application/vnd.oci.image.manifest.v1+json", b"{}");
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(
            json["mediaType"],
            "application/vnd.oci.image.manifest.v1+json"
        );
        assert_eq!(json["size"], 2);
        assert!(json["digest"].as_str().unwrap().starts_with("sha256:"));
        assert!(json.get("annotations").is_none());
    }

    #[test]
    fn test_json_round_trip_with_annotations() {
        let r = Reference::parse("alpine:0.2.0").unwrap();
        let d = Descriptor::from_bytes("application/octet-stream", b"x").with_ref_name(&r);
        let json = serde_json::to_string(&d).unwrap();
        let back: Descriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, d);
    }
}
