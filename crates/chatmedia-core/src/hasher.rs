use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

use crate::error::{Error, Result};

/// SHA-256 of some leading window of a file.
pub type Digest = [u8; 32];

const BLOCK_SIZE: usize = 8192;

/// How much of a file a digest covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Granularity {
    /// First N bytes, N smaller than the file.
    Prefix(u64),
    Full,
}

impl Granularity {
    /// A window that covers the whole file is a full hash.
    pub fn for_window(byte_limit: u64, size: u64) -> Self {
        if byte_limit >= size {
            Granularity::Full
        } else {
            Granularity::Prefix(byte_limit)
        }
    }

    fn byte_limit(self) -> u64 {
        match self {
            Granularity::Prefix(n) => n,
            Granularity::Full => u64::MAX,
        }
    }
}

/// Hash the leading window of `path` described by `granularity`, streaming in
/// fixed-size blocks. Touches no shared state, so it can run on any thread.
pub fn compute(path: &Path, granularity: Granularity) -> Result<Digest> {
    let hash_err = |source| Error::Hash {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = File::open(path).map_err(hash_err)?.take(granularity.byte_limit());
    let mut hasher = Sha256::new();
    let mut buf = [0u8; BLOCK_SIZE];
    loop {
        let n = reader.read(&mut buf).map_err(hash_err)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(to_digest(&hasher.finalize()))
}

fn to_digest(bytes: &[u8]) -> Digest {
    let mut digest = [0u8; 32];
    digest.copy_from_slice(bytes);
    digest
}

/// Counters for how much hashing work a run actually did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashStats {
    pub prefix_hashes: u64,
    pub full_hashes: u64,
    pub cache_hits: u64,
}

/// Chunked hasher with a memo table keyed by (path, granularity).
///
/// Entries are grouped per path so a settled file is dropped in one removal.
#[derive(Debug, Default)]
pub struct ChunkedHasher {
    cache: HashMap<PathBuf, HashMap<Granularity, Digest>>,
    stats: HashStats,
}

impl ChunkedHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Digest of the first `byte_limit` bytes, or the whole file if smaller.
    pub fn hash(&mut self, path: &Path, byte_limit: u64) -> Result<Digest> {
        let size = fs::metadata(path)
            .map_err(|source| Error::Hash {
                path: path.to_path_buf(),
                source,
            })?
            .len();
        self.hash_at(path, Granularity::for_window(byte_limit, size))
    }

    /// Digest of the entire file.
    pub fn full_hash(&mut self, path: &Path) -> Result<Digest> {
        self.hash_at(path, Granularity::Full)
    }

    pub fn hash_at(&mut self, path: &Path, granularity: Granularity) -> Result<Digest> {
        if let Some(digest) = self.cached(path, granularity) {
            self.stats.cache_hits += 1;
            return Ok(digest);
        }
        let digest = compute(path, granularity)?;
        self.insert(path.to_path_buf(), granularity, digest);
        Ok(digest)
    }

    pub fn cached(&self, path: &Path, granularity: Granularity) -> Option<Digest> {
        self.cache.get(path)?.get(&granularity).copied()
    }

    /// Record a digest computed elsewhere (e.g. on a worker thread).
    pub fn insert(&mut self, path: PathBuf, granularity: Granularity, digest: Digest) {
        match granularity {
            Granularity::Prefix(_) => self.stats.prefix_hashes += 1,
            Granularity::Full => self.stats.full_hashes += 1,
        }
        self.cache.entry(path).or_default().insert(granularity, digest);
    }

    /// Drop all entries for `path` once its group is settled.
    pub fn forget(&mut self, path: &Path) {
        self.cache.remove(path);
    }

    /// Number of files with at least one cached digest.
    pub fn cached_files(&self) -> usize {
        self.cache.len()
    }

    pub fn stats(&self) -> HashStats {
        self.stats
    }
}
