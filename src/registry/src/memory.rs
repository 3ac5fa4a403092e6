//! In-process registry implementing the remote seam.
//!
//! Backs the integration tests and any caller that wants a registry
//! without a network. Blobs are kept by digest, manifests by ref name,
//! exactly like a distribution server's tag store. A fault-injection
//! hook serves tampered bytes for a chosen digest so digest verification
//! paths can be exercised.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use chartcask_core::{CaskError, Result};

use crate::descriptor::Descriptor;
use crate::digest::Digest;
use crate::reference::Reference;
use crate::remote::{Authenticator, ChartPuller, ChartPusher, PushOutcome, RemoteResolver};

#[derive(Debug, Default)]
struct State {
    blobs: HashMap<Digest, Vec<u8>>,
    /// ref full name → manifest descriptor
    manifests: HashMap<String, Descriptor>,
    /// host → username
    logins: HashMap<String, String>,
    /// digests whose fetches return corrupted bytes
    corrupted: HashSet<Digest>,
}

/// In-memory OCI registry.
#[derive(Debug, Default, Clone)]
pub struct MemoryRegistry {
    state: Arc<RwLock<State>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blobs the registry holds.
    pub async fn blob_count(&self) -> usize {
        self.state.read().await.blobs.len()
    }

    /// Manifest descriptor bound to a reference, if pushed.
    pub async fn manifest_for(&self, reference: &Reference) -> Option<Descriptor> {
        self.state
            .read()
            .await
            .manifests
            .get(&reference.full_name())
            .cloned()
    }

    /// Username recorded by the last login against a host.
    pub async fn logged_in_user(&self, host: &str) -> Option<String> {
        self.state.read().await.logins.get(host).cloned()
    }

    /// Serve tampered bytes for this digest from now on.
    pub async fn corrupt_blob(&self, digest: &Digest) {
        self.state.write().await.corrupted.insert(digest.clone());
    }

    /// Bind a reference to an arbitrary descriptor and payload, bypassing
    /// push-side validation. Lets tests serve malformed manifests.
    pub async fn install_manifest(
        &self,
        reference: &Reference,
        descriptor: Descriptor,
        bytes: Vec<u8>,
    ) {
        let mut state = self.state.write().await;
        state.blobs.insert(descriptor.digest.clone(), bytes);
        state.manifests.insert(reference.full_name(), descriptor);
    }
}

impl RemoteResolver for MemoryRegistry {
    fn pusher(&self, _reference: &Reference) -> Result<Box<dyn ChartPusher>> {
        Ok(Box::new(MemoryStream {
            state: self.state.clone(),
        }))
    }

    fn puller(&self, _reference: &Reference) -> Result<Box<dyn ChartPuller>> {
        Ok(Box::new(MemoryStream {
            state: self.state.clone(),
        }))
    }

    fn authenticator(&self) -> &dyn Authenticator {
        self
    }
}

#[async_trait]
impl Authenticator for MemoryRegistry {
    async fn login(&self, host: &str, username: &str, _password: &str) -> Result<()> {
        self.state
            .write()
            .await
            .logins
            .insert(host.to_string(), username.to_string());
        Ok(())
    }

    async fn logout(&self, host: &str) -> Result<()> {
        match self.state.write().await.logins.remove(host) {
            Some(_) => Ok(()),
            None => Err(CaskError::Remote(format!("not logged in to {host}"))),
        }
    }
}

/// Push/pull handle over the shared registry state.
struct MemoryStream {
    state: Arc<RwLock<State>>,
}

#[async_trait]
impl ChartPusher for MemoryStream {
    async fn push_blob(&self, descriptor: &Descriptor, bytes: &[u8]) -> Result<PushOutcome> {
        let actual = Digest::from_bytes(bytes);
        if actual != descriptor.digest {
            return Err(CaskError::Remote(format!(
                "registry rejected blob: digest {actual} does not match descriptor {}",
                descriptor.digest
            )));
        }

        let mut state = self.state.write().await;
        if state.blobs.contains_key(&descriptor.digest) {
            return Ok(PushOutcome::AlreadyExists);
        }
        state.blobs.insert(descriptor.digest.clone(), bytes.to_vec());
        Ok(PushOutcome::Uploaded)
    }

    async fn push_manifest(
        &self,
        reference: &Reference,
        descriptor: &Descriptor,
        bytes: &[u8],
    ) -> Result<PushOutcome> {
        let mut state = self.state.write().await;
        let existed = state.blobs.contains_key(&descriptor.digest);
        state.blobs.insert(descriptor.digest.clone(), bytes.to_vec());
        state
            .manifests
            .insert(reference.full_name(), descriptor.clone());
        Ok(if existed {
            PushOutcome::AlreadyExists
        } else {
            PushOutcome::Uploaded
        })
    }
}

#[async_trait]
impl ChartPuller for MemoryStream {
    async fn resolve(&self, reference: &Reference) -> Result<Descriptor> {
        self.state
            .read()
            .await
            .manifests
            .get(&reference.full_name())
            .cloned()
            .ok_or_else(|| {
                CaskError::Remote(format!("manifest unknown: {}", reference.full_name()))
            })
    }

    async fn fetch(&self, descriptor: &Descriptor) -> Result<Vec<u8>> {
        let state = self.state.read().await;
        let mut bytes = state
            .blobs
            .get(&descriptor.digest)
            .cloned()
            .ok_or_else(|| CaskError::Remote(format!("blob unknown: {}", descriptor.digest)))?;

        if state.corrupted.contains(&descriptor.digest) {
            for b in bytes.iter_mut() {
                *b ^= 0xff;
            }
        }
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(bytes: &[u8]) -> Descriptor {
        Descriptor::from_bytes("application/octet-stream", bytes)
    }

    fn reference() -> Reference {
        Reference::parse("localhost:5000/mychart:0.1.0").unwrap()
    }

    #[tokio::test]
    async fn test_push_then_fetch() {
        let registry = MemoryRegistry::new();
        let pusher = registry.pusher(&reference()).unwrap();
        let desc = descriptor(b"payload");

        assert_eq!(
            pusher.push_blob(&desc, b"payload").await.unwrap(),
            PushOutcome::Uploaded
        );
        assert_eq!(
            pusher.push_blob(&desc, b"payload").await.unwrap(),
            PushOutcome::AlreadyExists
        );

        let puller = registry.puller(&reference()).unwrap();
        assert_eq!(puller.fetch(&desc).await.unwrap(), b"payload");
    }

    #[tokio::test]
    async fn test_push_blob_verifies_digest() {
        let registry = MemoryRegistry::new();
        let pusher = registry.pusher(&reference()).unwrap();
        let desc = descriptor(b"payload");
        assert!(pusher.push_blob(&desc, b"other bytes").await.is_err());
    }

    #[tokio::test]
    async fn test_manifest_binds_tag() {
        let registry = MemoryRegistry::new();
        let pusher = registry.pusher(&reference()).unwrap();
        let desc = descriptor(b"{}");

        pusher
            .push_manifest(&reference(), &desc, b"{}")
            .await
            .unwrap();

        let puller = registry.puller(&reference()).unwrap();
        let resolved = puller.resolve(&reference()).await.unwrap();
        assert_eq!(resolved.digest, desc.digest);
    }

    #[tokio::test]
    async fn test_resolve_unknown_ref() {
        let registry = MemoryRegistry::new();
        let puller = registry.puller(&reference()).unwrap();
        assert!(matches!(
            puller.resolve(&reference()).await,
            Err(CaskError::Remote(_))
        ));
    }

    #[tokio::test]
    async fn test_corrupt_blob_serves_tampered_bytes() {
        let registry = MemoryRegistry::new();
        let pusher = registry.pusher(&reference()).unwrap();
        let desc = descriptor(b"payload");
        pusher.push_blob(&desc, b"payload").await.unwrap();

        registry.corrupt_blob(&desc.digest).await;
        let puller = registry.puller(&reference()).unwrap();
        let bytes = puller.fetch(&desc).await.unwrap();
        assert_ne!(bytes, b"payload");
        assert_ne!(Digest::from_bytes(&bytes), desc.digest);
    }

    #[tokio::test]
    async fn test_login_logout() {
        let registry = MemoryRegistry::new();
        registry
            .login("localhost:5000", "user", "secret")
            .await
            .unwrap();
        assert_eq!(
            registry.logged_in_user("localhost:5000").await,
            Some("user".to_string())
        );

        registry.logout("localhost:5000").await.unwrap();
        assert!(registry.logout("localhost:5000").await.is_err());
    }
}
