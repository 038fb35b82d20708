//! File-based persistence for derived cipher programs
//!
//! Programs are stored as a JSON object mapping each content version to its
//! operation list. Persistence is enabled by setting `cipher.cache_file`.

use crate::{
    Result,
    cipher::{CipherOp, CipherProgram},
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, error, warn};

/// File-backed store for cipher programs
#[derive(Debug, Clone)]
pub struct FileCache {
    cache_path: PathBuf,
}

impl FileCache {
    /// Create new file cache manager
    pub fn new(cache_path: PathBuf) -> Self {
        Self { cache_path }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.cache_path
    }

    /// Load programs from the file
    ///
    /// A missing, unreadable or malformed file yields an empty list.
    pub async fn load_programs(&self) -> Result<Vec<CipherProgram>> {
        if !self.cache_path.exists() {
            debug!("Cache file does not exist: {:?}", self.cache_path);
            return Ok(Vec::new());
        }

        match fs::read_to_string(&self.cache_path).await {
            Ok(content) => {
                debug!("Loading cipher programs from: {:?}", self.cache_path);
                Ok(self.parse_cache_content(&content))
            }
            Err(e) => {
                warn!("Failed to read cache file {:?}: {}", self.cache_path, e);
                Ok(Vec::new())
            }
        }
    }

    /// Write programs to the file, replacing its content
    pub async fn save_programs(&self, programs: &[CipherProgram]) -> Result<()> {
        let entries: BTreeMap<&str, &[CipherOp]> = programs
            .iter()
            .map(|p| (p.version.as_str(), p.ops.as_slice()))
            .collect();
        let content = serde_json::to_string_pretty(&entries)?;

        if let Some(parent) = self.cache_path.parent()
            && let Err(e) = fs::create_dir_all(parent).await
        {
            error!("Failed to create cache directory {:?}: {}", parent, e);
            return Err(crate::Error::cache(
                "directory_creation",
                &format!("Directory creation failed: {}", e),
            ));
        }

        match fs::write(&self.cache_path, content).await {
            Ok(_) => {
                debug!(
                    "Saved {} cipher programs to: {:?}",
                    programs.len(),
                    self.cache_path
                );
                Ok(())
            }
            Err(e) => {
                error!("Failed to write cache file {:?}: {}", self.cache_path, e);
                Err(crate::Error::cache(
                    "file_write",
                    &format!("Write failed: {}", e),
                ))
            }
        }
    }

    fn parse_cache_content(&self, content: &str) -> Vec<CipherProgram> {
        let raw: BTreeMap<String, serde_json::Value> = match serde_json::from_str(content) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Error parsing cipher cache: {}", e);
                return Vec::new();
            }
        };

        let mut programs = Vec::with_capacity(raw.len());
        for (version, value) in raw {
            match serde_json::from_value::<Vec<CipherOp>>(value) {
                Ok(ops) => programs.push(CipherProgram::new(version, ops)),
                Err(e) => warn!("Ignored cache entry for '{}': {}", version, e),
            }
        }

        debug!("Loaded {} cipher programs", programs.len());
        programs
    }
}
