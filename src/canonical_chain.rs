/// Canonical Chain Index
///
/// Holds the externally supplied list of canonical block hashes, in chain
/// order, plus a set for membership tests. Blocks found in blk files but
/// missing from the set are orphans from abandoned forks.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::{error, info};

use crate::error::LinearizeError;

/// Read one display-format hash per line, preserving order
pub fn load_hash_list(path: impl AsRef<Path>) -> Result<Vec<String>, LinearizeError> {
    let path = path.as_ref();
    let hash_list_err = |source| LinearizeError::HashList {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(hash_list_err)?;
    let mut hashes = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(hash_list_err)?;
        let hash = line.trim_end();
        if hash.is_empty() {
            continue;
        }
        hashes.push(hash.to_ascii_lowercase());
    }

    info!(count = hashes.len(), path = %path.display(), "Read hashes");
    Ok(hashes)
}

/// Ordered canonical hashes with O(1) membership
#[derive(Debug, Clone)]
pub struct CanonicalIndex {
    hashes: Vec<String>,
    members: HashSet<String>,
}

impl CanonicalIndex {
    pub fn from_hashes(hashes: Vec<String>) -> Self {
        let members = hashes.iter().cloned().collect();
        Self { hashes, members }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, LinearizeError> {
        Ok(Self::from_hashes(load_hash_list(path)?))
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.members.contains(hash)
    }

    /// Hash expected at canonical position `position`, if the list reaches it
    pub fn expected_at(&self, position: u64) -> Option<&str> {
        usize::try_from(position)
            .ok()
            .and_then(|i| self.hashes.get(i))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    /// Guard against linearizing with a hash list from the wrong chain
    pub fn check_sanity_hash(&self, sanity_hash: Option<&str>) -> Result<(), LinearizeError> {
        match sanity_hash {
            Some(hash) if !self.contains(&hash.to_ascii_lowercase()) => {
                error!(hash = %hash, "Sanity hash not found in hash list");
                Err(LinearizeError::SanityHashMissing(hash.to_string()))
            }
            _ => Ok(()),
        }
    }
}
