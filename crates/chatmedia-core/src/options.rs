use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_CHUNK_SIZE: u64 = 1024;
pub const DEFAULT_GROWTH_FACTOR: u64 = 64;

fn default_extensions() -> Vec<String> {
    ["jpg", "jpeg", "png", "webp", "gif", "mp4", "3gp", "mov", "opus", "m4a"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_chunk_size() -> u64 {
    DEFAULT_CHUNK_SIZE
}

fn default_growth_factor() -> u64 {
    DEFAULT_GROWTH_FACTOR
}

/// Which files a run looks at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanOptions {
    pub path: PathBuf,
    #[serde(default)]
    pub recursive: bool,
    /// Lowercase extensions without the dot
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

impl ScanOptions {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            recursive: false,
            extensions: default_extensions(),
        }
    }

    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreOptions {
    #[serde(flatten)]
    pub scan: ScanOptions,
    /// Also set the filesystem modified time of images
    #[serde(default, rename = "mod")]
    pub set_mtime: bool,
}

impl RestoreOptions {
    pub fn new(scan: ScanOptions) -> Self {
        Self {
            scan,
            set_mtime: false,
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        load_json(path)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupOptions {
    #[serde(flatten)]
    pub scan: ScanOptions,
    /// Initial hashing window in bytes
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,
    /// Window multiplier for each escalation round
    #[serde(default = "default_growth_factor")]
    pub growth_factor: u64,
    /// Delete without asking
    #[serde(default)]
    pub force: bool,
    /// Report what would be deleted, touch nothing
    #[serde(default)]
    pub dry_run: bool,
    /// Hashing threads; `None` uses rayon's default pool
    #[serde(default)]
    pub jobs: Option<usize>,
}

impl DedupOptions {
    pub fn new(scan: ScanOptions) -> Self {
        Self {
            scan,
            chunk_size: DEFAULT_CHUNK_SIZE,
            growth_factor: DEFAULT_GROWTH_FACTOR,
            force: false,
            dry_run: false,
            jobs: None,
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        load_json(path)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::InvalidOptions("chunk_size must be greater than 0".into()));
        }
        if self.growth_factor < 2 {
            return Err(Error::InvalidOptions("growth_factor must be at least 2".into()));
        }
        if self.jobs == Some(0) {
            return Err(Error::InvalidOptions("jobs must be greater than 0".into()));
        }
        Ok(())
    }
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path)
        .map_err(|e| Error::InvalidOptions(format!("cannot open {}: {}", path.display(), e)))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| Error::InvalidOptions(format!("cannot parse {}: {}", path.display(), e)))
}
