//! Chart reference parsing.
//!
//! Parses references like `localhost:5000/alpine:0.2.0` into a repo and a
//! tag. The tag is the substring after the last `:`, so registry ports
//! stay inside the repo part.

use std::fmt;
use std::str::FromStr;

use chartcask_core::{CaskError, Result};

/// Parsed chart reference.
///
/// Fields are public so callers can inspect (and tests can construct)
/// references directly; values produced by [`Reference::parse`] always
/// have a non-empty repo and tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    /// Repository, possibly with a registry host and port
    /// (e.g., "localhost:5000/alpine")
    pub repo: String,
    /// Tag (e.g., "0.2.0")
    pub tag: String,
}

impl Reference {
    /// Parse a `repo:tag` reference string.
    ///
    /// Both parts must be non-empty. Digest references
    /// (`repo@sha256:...`) are rejected.
    pub fn parse(reference: &str) -> Result<Self> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(CaskError::InvalidReference(reference.to_string()));
        }

        if reference.contains('@') {
            return Err(CaskError::InvalidReference(reference.to_string()));
        }

        let colon_pos = reference
            .rfind(':')
            .ok_or_else(|| CaskError::InvalidReference(reference.to_string()))?;

        let repo = &reference[..colon_pos];
        let tag = &reference[colon_pos + 1..];
        if repo.is_empty() || tag.is_empty() {
            return Err(CaskError::InvalidReference(reference.to_string()));
        }

        // A tag containing '/' means the last colon belonged to a registry
        // port and no tag was given (e.g., "localhost:5000/alpine").
        if tag.contains('/') {
            return Err(CaskError::InvalidReference(reference.to_string()));
        }

        Ok(Reference {
            repo: repo.to_string(),
            tag: tag.to_string(),
        })
    }

    /// Canonical `repo:tag` form.
    pub fn full_name(&self) -> String {
        format!("{}:{}", self.repo, self.tag)
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_name())
    }
}

impl FromStr for Reference {
    type Err = CaskError;

    fn from_str(s: &str) -> Result<Self> {
        Reference::parse(s)
    }
}
