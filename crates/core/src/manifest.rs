//! The compilation-unit manifest handed from the rewriter to the reducer.
//!
//! A plain JSON array of unit identifiers at a fixed path next to the source
//! trees. Written once after the full tree walk; consumed exactly once by
//! the symbol reducer.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for manifest IO. A missing or malformed manifest is fatal to
/// the reducer, which must not touch the binary without one.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Failed to read manifest {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },

    #[error("Failed to parse manifest {path}: {source}")]
    Parse { path: PathBuf, source: serde_json::Error },

    #[error("Failed to write manifest {path}: {source}")]
    Write { path: PathBuf, source: std::io::Error },

    #[error("Failed to serialize manifest: {0}")]
    Serialize(serde_json::Error),
}

/// Set of compilation units seen by a rewriter run.
///
/// Serialized transparently as a JSON array of strings; the set keeps the
/// entries unique and the on-disk order deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    units: BTreeSet<String>,
}

impl Manifest {
    /// Build a manifest from any collection of unit identifiers.
    pub fn from_units<I, S>(units: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { units: units.into_iter().map(Into::into).collect() }
    }

    /// Unit identifiers in sorted order.
    pub fn units(&self) -> impl Iterator<Item = &str> {
        self.units.iter().map(String::as_str)
    }

    pub fn contains(&self, unit: &str) -> bool {
        self.units.contains(unit)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Serialize as a JSON array and write to `path`, replacing any previous
    /// manifest.
    pub fn write(&self, path: &Path) -> Result<(), ManifestError> {
        let json = serde_json::to_string(self).map_err(ManifestError::Serialize)?;
        fs::write(path, json)
            .map_err(|source| ManifestError::Write { path: path.to_path_buf(), source })
    }

    /// Load a manifest previously written by [`Manifest::write`].
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let body = fs::read_to_string(path)
            .map_err(|source| ManifestError::Read { path: path.to_path_buf(), source })?;
        serde_json::from_str(&body)
            .map_err(|source| ManifestError::Parse { path: path.to_path_buf(), source })
    }
}
