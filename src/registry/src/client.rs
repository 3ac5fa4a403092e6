//! Registry client: the facade the package manager drives.
//!
//! Wraps the chart cache and a [`RemoteResolver`] behind the eight
//! operations of the client surface (login, logout, save, load, remove,
//! list, push, pull), printing human-readable progress to a
//! caller-supplied writer.
//!
//! Push and pull move through a fixed sequence (resolve, transfer
//! config, transfer layer, transfer manifest, index) and abort without
//! touching the index on any error or cancellation.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use comfy_table::{ContentArrangement, Table};
use tokio_util::sync::CancellationToken;

use chartcask_core::{CaskError, Chart, Result};

use crate::archive::ChartArchiver;
use crate::cache::{CacheEntry, ChartCache};
use crate::descriptor::Descriptor;
use crate::digest::Digest;
use crate::manifest::MANIFEST_MEDIA_TYPE;
use crate::output;
use crate::reference::Reference;
use crate::remote::{PushOutcome, RemoteResolver};

/// Configuration for a [`RegistryClient`].
pub struct ClientOptions {
    /// Root directory of the local chart cache
    pub cache_root: PathBuf,
    /// Remote transport capability
    pub resolver: Arc<dyn RemoteResolver>,
    /// Chart to/from archive codec
    pub archiver: Arc<dyn ChartArchiver>,
    /// Destination for human-readable progress output
    pub out: Box<dyn Write + Send>,
}

/// Client over the local chart cache and an OCI registry.
pub struct RegistryClient {
    cache: ChartCache,
    resolver: Arc<dyn RemoteResolver>,
    out: Box<dyn Write + Send>,
}

impl RegistryClient {
    pub fn new(options: ClientOptions) -> Self {
        Self {
            cache: ChartCache::new(options.cache_root, options.archiver),
            resolver: options.resolver,
            out: options.out,
        }
    }

    /// The underlying cache, for callers that need direct access.
    pub fn cache(&self) -> &ChartCache {
        &self.cache
    }

    /// Log in to a registry host.
    pub async fn login(&mut self, host: &str, username: &str, password: &str) -> Result<()> {
        self.resolver
            .authenticator()
            .login(host, username, password)
            .await?;
        writeln!(self.out, "Login succeeded")?;
        Ok(())
    }

    /// Log out of a registry host.
    pub async fn logout(&mut self, host: &str) -> Result<()> {
        self.resolver.authenticator().logout(host).await?;
        writeln!(self.out, "Logout succeeded")?;
        Ok(())
    }

    /// Store a chart in the local cache under a reference.
    pub fn save(&mut self, chart: &Chart, reference: &Reference) -> Result<()> {
        let entry = self.cache.store(chart, reference)?;
        self.print_summary(&entry)?;
        Ok(())
    }

    /// Retrieve a chart from the local cache.
    pub fn load(&mut self, reference: &Reference) -> Result<Chart> {
        match self.cache.fetch(reference)? {
            Some(fetched) => Ok(fetched.chart),
            None => Err(CaskError::RefNotFound(reference.full_name())),
        }
    }

    /// Delete a reference from the local cache. Blobs are retained.
    pub fn remove(&mut self, reference: &Reference) -> Result<()> {
        match self.cache.delete(reference)? {
            Some(_) => {
                writeln!(self.out, "{}: removed", reference.tag)?;
                Ok(())
            }
            None => Err(CaskError::RefNotFound(reference.full_name())),
        }
    }

    /// Print a table of all locally cached charts.
    pub fn list(&mut self) -> Result<()> {
        let mut table = Table::new();
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.load_preset(comfy_table::presets::NOTHING);
        table.set_header(["REF", "NAME", "VERSION", "DIGEST", "SIZE", "CREATED"]);

        for entry in self.cache.list()? {
            // A row missing its created time would render a hole; skip it.
            let created = match entry.created {
                Some(t) => output::human_duration(&t),
                None => continue,
            };
            table.add_row([
                entry.reference.full_name(),
                entry.name,
                entry.version,
                entry.content_digest.short().to_string(),
                output::byte_count_binary(entry.size),
                created,
            ]);
        }

        writeln!(self.out, "{table}")?;
        Ok(())
    }

    /// Upload a cached chart to the remote registry.
    pub async fn push(&mut self, reference: &Reference, cancel: &CancellationToken) -> Result<()> {
        let layers = self.cache.load_layers(reference)?;
        writeln!(self.out, "The push refers to repository [{}]", reference.repo)?;

        let pusher = self.resolver.pusher(reference)?;

        for (descriptor, bytes) in [
            (&layers.config, layers.config_bytes.as_slice()),
            (&layers.layer, layers.layer_bytes.as_slice()),
        ] {
            check_cancelled(cancel)?;
            if pusher.push_blob(descriptor, bytes).await? == PushOutcome::AlreadyExists {
                tracing::debug!(digest = %descriptor.digest, "blob already on remote");
            }
        }

        check_cancelled(cancel)?;
        pusher
            .push_manifest(reference, &layers.manifest, &layers.manifest_bytes)
            .await?;

        writeln!(
            self.out,
            "{}: pushed to remote (1 layer, {} total)",
            reference.tag,
            output::byte_count_binary(layers.layer.size)
        )?;
        Ok(())
    }

    /// Download a chart from the remote registry into the local cache.
    pub async fn pull(&mut self, reference: &Reference, cancel: &CancellationToken) -> Result<()> {
        if reference.tag.is_empty() {
            return Err(CaskError::InvalidReference(reference.full_name()));
        }

        let exists_before = self.cache.contains(reference)?;
        writeln!(self.out, "{}: Pulling from {}", reference.tag, reference.repo)?;

        let puller = self.resolver.puller(reference)?;

        check_cancelled(cancel)?;
        let manifest_desc = puller.resolve(reference).await?;
        if manifest_desc.media_type != MANIFEST_MEDIA_TYPE {
            return Err(CaskError::MalformedManifest(format!(
                "unexpected manifest media type {:?}",
                manifest_desc.media_type
            )));
        }

        check_cancelled(cancel)?;
        let manifest_bytes = puller.fetch(&manifest_desc).await?;
        verify_digest(&manifest_desc, &manifest_bytes)?;
        let (config_desc, layer_desc) = crate::manifest::unpack(&manifest_bytes)?;

        check_cancelled(cancel)?;
        let config_bytes = puller.fetch(&config_desc).await?;
        verify_digest(&config_desc, &config_bytes)?;

        check_cancelled(cancel)?;
        let layer_bytes = puller.fetch(&layer_desc).await?;
        verify_digest(&layer_desc, &layer_bytes)?;

        check_cancelled(cancel)?;
        self.cache
            .store_layers(reference, config_desc, layer_desc, &config_bytes, &layer_bytes)?;

        if exists_before {
            writeln!(self.out, "Status: Chart is up to date for {reference}")?;
        } else {
            writeln!(self.out, "Status: Downloaded newer chart for {reference}")?;
        }
        Ok(())
    }

    fn print_summary(&mut self, entry: &CacheEntry) -> Result<()> {
        writeln!(self.out, "Reference:        {}", entry.reference)?;
        writeln!(self.out, "Chart Name:       {}", entry.name)?;
        writeln!(self.out, "Chart Version:    {}", entry.version)?;
        writeln!(
            self.out,
            "Content Size:     {}",
            output::byte_count_binary(entry.size)
        )?;
        writeln!(self.out, "Content Digest:   {}", entry.content_digest.hex())?;
        writeln!(self.out, "Config Digest:    {}", entry.config_digest.hex())?;
        writeln!(self.out, "Manifest Digest:  {}", entry.manifest_digest.hex())?;
        Ok(())
    }
}

fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(CaskError::Cancelled);
    }
    Ok(())
}

/// Check downloaded bytes against the descriptor that advertised them.
fn verify_digest(descriptor: &Descriptor, bytes: &[u8]) -> Result<()> {
    let actual = Digest::from_bytes(bytes);
    if actual != descriptor.digest {
        return Err(CaskError::DigestMismatch {
            expected: descriptor.digest.prefixed(),
            actual: actual.prefixed(),
        });
    }
    Ok(())
}
