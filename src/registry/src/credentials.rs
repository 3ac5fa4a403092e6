//! Persistent credential store for chart registries.
//!
//! A JSON file mapping registry host to username/password, written
//! atomically (temp file, rename). The file path is supplied by the
//! caller; the core never probes the environment for one. Implements
//! [`Authenticator`] so a transport resolver can delegate its
//! login/logout flows here.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use chartcask_core::{CaskError, Result};

use crate::remote::Authenticator;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CredentialEntry {
    username: String,
    password: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CredentialFile {
    registries: BTreeMap<String, CredentialEntry>,
}

/// File-backed credential store.
#[derive(Debug)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Create a store backed by the given file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store credentials for a host. Overwrites any existing entry.
    pub fn store(&self, host: &str, username: &str, password: &str) -> Result<()> {
        let mut file = self.read_file()?;
        file.registries.insert(
            host.to_string(),
            CredentialEntry {
                username: username.to_string(),
                password: password.to_string(),
            },
        );
        self.write_file(&file)
    }

    /// Credentials for a host as `(username, password)`.
    pub fn get(&self, host: &str) -> Result<Option<(String, String)>> {
        let file = self.read_file()?;
        Ok(file
            .registries
            .get(host)
            .map(|e| (e.username.clone(), e.password.clone())))
    }

    /// Remove the entry for a host. Returns whether one existed.
    pub fn remove(&self, host: &str) -> Result<bool> {
        let mut file = self.read_file()?;
        let removed = file.registries.remove(host).is_some();
        if removed {
            self.write_file(&file)?;
        }
        Ok(removed)
    }

    /// All hosts with stored credentials, sorted.
    pub fn hosts(&self) -> Result<Vec<String>> {
        let file = self.read_file()?;
        Ok(file.registries.keys().cloned().collect())
    }

    fn read_file(&self) -> Result<CredentialFile> {
        match std::fs::read(&self.path) {
            Ok(raw) => Ok(serde_json::from_slice(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(CredentialFile::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_file(&self, file: &CredentialFile) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                std::fs::create_dir_all(parent)?;
                parent.to_path_buf()
            }
            _ => PathBuf::from("."),
        };

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&serde_json::to_vec_pretty(file)?)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| CaskError::Io(e.error))?;
        Ok(())
    }
}

#[async_trait]
impl Authenticator for CredentialStore {
    async fn login(&self, host: &str, username: &str, password: &str) -> Result<()> {
        self.store(host, username, password)
    }

    async fn logout(&self, host: &str) -> Result<()> {
        if self.remove(host)? {
            Ok(())
        } else {
            Err(CaskError::Remote(format!("not logged in to {host}")))
        }
    }
}
