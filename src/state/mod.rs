//! Durable state shared across runs.
//!
//! Everything the batch job needs to resume lives here as flat JSON files
//! under the data directory: the exclusion ledger, the monitoring file and
//! per-PR output artifacts. Files are read fully, modified in memory and
//! rewritten fully through [`write_json_atomic`].

pub mod artifacts;
pub mod layout;
pub mod ledger;
pub mod monitor;

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

pub use artifacts::ArtifactStore;
pub use layout::DataLayout;
pub use ledger::ExclusionLedger;
pub use monitor::{ProgressMonitor, PullTimings};

/// Errors reading or writing state files.
#[derive(Error, Debug)]
pub enum StateError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("corrupt state file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize state: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Read and deserialize a JSON file. A missing file yields `Ok(None)`.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StateError> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StateError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|source| StateError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

/// Serialize `value` and replace `path` with it atomically.
///
/// The content goes to a sibling temp file first and is renamed over the
/// target, so a crash never leaves a half-written file behind.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StateError> {
    let write_err = |source| StateError::Write {
        path: path.to_path_buf(),
        source,
    };

    let content = serde_json::to_vec_pretty(value)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_err)?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    let mut tmp_file = fs::File::create(&tmp_path).map_err(write_err)?;
    tmp_file.write_all(&content).map_err(write_err)?;
    tmp_file.flush().map_err(write_err)?;
    drop(tmp_file);

    fs::rename(&tmp_path, path).map_err(|source| {
        let _ = fs::remove_file(&tmp_path);
        write_err(source)
    })
}
