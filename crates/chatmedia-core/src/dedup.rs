//! Duplicate detection by progressive hashing.
//!
//! Files are bucketed by size, then by the digest of a leading window that
//! grows by `growth_factor` each round until it covers the whole file. Only
//! buckets with two or more members are hashed again, so a file stops costing
//! I/O as soon as it is known to be unique.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use chrono::NaiveDateTime;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::hasher::{self, ChunkedHasher, Digest, Granularity, HashStats};
use crate::media::MediaFile;
use crate::ThrottledProgress;

/// Files confirmed identical by full-content hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    /// Hex SHA-256 of the shared content
    pub digest: String,
    pub size: u64,
    /// The one file that is kept
    pub survivor: PathBuf,
    pub survivor_date: Option<NaiveDateTime>,
    /// Everything else in the group, in path order
    pub discards: Vec<PathBuf>,
}

impl DuplicateGroup {
    pub fn file_count(&self) -> usize {
        self.discards.len() + 1
    }

    /// Bytes freed by removing the discards.
    pub fn reclaimable_bytes(&self) -> u64 {
        self.size * self.discards.len() as u64
    }
}

/// A file that could not be read during the scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashFailure {
    pub path: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DedupReport {
    pub files_scanned: u64,
    /// Sorted by survivor path
    pub groups: Vec<DuplicateGroup>,
    pub failures: Vec<HashFailure>,
    pub stats: HashStats,
    /// Number of escalation rounds run
    pub rounds: u32,
}

impl DedupReport {
    pub fn has_duplicates(&self) -> bool {
        !self.groups.is_empty()
    }

    pub fn discard_count(&self) -> usize {
        self.groups.iter().map(|g| g.discards.len()).sum()
    }

    pub fn reclaimable_bytes(&self) -> u64 {
        self.groups.iter().map(DuplicateGroup::reclaimable_bytes).sum()
    }
}

/// Parameters for one resolver run.
#[derive(Debug, Clone, Copy)]
pub struct HashingPlan {
    pub chunk_size: u64,
    pub growth_factor: u64,
}

/// Keep-preference order: known filename date before unknown, earlier date
/// first, then shorter name, then path. Total and stable, so the first element
/// after sorting is always the same survivor for the same input set.
pub fn keep_order(a: &MediaFile, b: &MediaFile) -> Ordering {
    let by_date = match (a.date, b.date) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_date
        .then_with(|| a.name_len().cmp(&b.name_len()))
        .then_with(|| a.path.cmp(&b.path))
}

/// Index of the file to keep among `members`.
pub fn select_survivor(members: &[&MediaFile]) -> Option<usize> {
    (0..members.len()).min_by(|&i, &j| keep_order(members[i], members[j]))
}

/// A bucket still waiting to be split, with the window it is hashed at next.
struct Candidate {
    size: u64,
    members: Vec<usize>,
    window: u64,
}

impl Candidate {
    fn granularity(&self) -> Granularity {
        Granularity::for_window(self.window, self.size)
    }
}

/// Progressive-hash resolver over one scan's files.
pub struct Resolver<'a> {
    plan: HashingPlan,
    pool: Option<rayon::ThreadPool>,
    hasher: ChunkedHasher,
    progress: &'a ThrottledProgress<'a>,
}

impl<'a> Resolver<'a> {
    pub fn new(plan: HashingPlan, jobs: Option<usize>, progress: &'a ThrottledProgress<'a>) -> Result<Self> {
        let pool = match jobs {
            Some(n) => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .build()
                    .map_err(|e| Error::InvalidOptions(format!("cannot start hashing pool: {}", e)))?,
            ),
            None => None,
        };
        Ok(Self {
            plan,
            pool,
            hasher: ChunkedHasher::new(),
            progress,
        })
    }

    /// Find confirmed duplicate groups among `paths`.
    pub fn resolve<I>(&mut self, paths: I) -> DedupReport
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let mut report = DedupReport::default();

        let mut files: Vec<MediaFile> = Vec::new();
        for path in paths {
            report.files_scanned += 1;
            match MediaFile::from_path(path.clone()) {
                Ok(file) => files.push(file),
                Err(source) => {
                    let err = Error::Hash { path: path.clone(), source };
                    log::warn!("{}", err);
                    report.failures.push(HashFailure {
                        path,
                        error: err.to_string(),
                    });
                }
            }
        }
        files.sort_by(|a, b| a.path.cmp(&b.path));
        files.dedup_by(|a, b| a.path == b.path);

        log::info!("Comparing file sizes of {} files", files.len());
        let mut by_size: BTreeMap<u64, Vec<usize>> = BTreeMap::new();
        for (i, file) in files.iter().enumerate() {
            by_size.entry(file.size).or_default().push(i);
        }
        let mut pending: Vec<Candidate> = by_size
            .into_iter()
            .filter(|(_, members)| members.len() > 1)
            .map(|(size, members)| Candidate {
                size,
                members,
                window: self.plan.chunk_size,
            })
            .collect();

        let mut confirmed: Vec<(Digest, Vec<usize>)> = Vec::new();
        while !pending.is_empty() {
            report.rounds += 1;
            pending = self.escalate(pending, &files, &mut confirmed, &mut report.failures);
        }

        report.groups = confirmed
            .into_iter()
            .map(|(digest, members)| build_group(&files, digest, &members))
            .collect();
        report.groups.sort_by(|a, b| a.survivor.cmp(&b.survivor));
        report.stats = self.hasher.stats();

        log::info!(
            "Found {} duplicate groups ({} files to discard) in {} rounds",
            report.groups.len(),
            report.discard_count(),
            report.rounds
        );
        report
    }

    /// Hash every pending member at its bucket's granularity, split buckets by
    /// digest, and return the buckets that are still ambiguous.
    fn escalate(
        &mut self,
        pending: Vec<Candidate>,
        files: &[MediaFile],
        confirmed: &mut Vec<(Digest, Vec<usize>)>,
        failures: &mut Vec<HashFailure>,
    ) -> Vec<Candidate> {
        let jobs: Vec<(usize, Granularity)> = pending
            .iter()
            .flat_map(|c| c.members.iter().map(move |&i| (i, c.granularity())))
            .filter(|&(i, g)| self.hasher.cached(&files[i].path, g).is_none())
            .collect();
        log::debug!("Hashing {} files across {} buckets", jobs.len(), pending.len());

        let total = jobs.len() as u64;
        let counter = AtomicU64::new(0);
        let progress = self.progress;
        let hash_all = || -> Vec<(usize, Granularity, Result<Digest>)> {
            jobs.par_iter()
                .map(|&(i, g)| {
                    let digest = hasher::compute(&files[i].path, g);
                    let current = counter.fetch_add(1, AtomicOrdering::Relaxed);
                    progress.report("hash", current, total, "Hashing candidates");
                    (i, g, digest)
                })
                .collect()
        };
        let results = match &self.pool {
            Some(pool) => pool.install(hash_all),
            None => hash_all(),
        };

        // cache writes stay on this thread, in job order
        let mut unreadable = HashSet::new();
        for (i, g, digest) in results {
            match digest {
                Ok(d) => self.hasher.insert(files[i].path.clone(), g, d),
                Err(err) => {
                    log::warn!("{}", err);
                    failures.push(HashFailure {
                        path: files[i].path.clone(),
                        error: err.to_string(),
                    });
                    self.hasher.forget(&files[i].path);
                    unreadable.insert(i);
                }
            }
        }

        let mut next = Vec::new();
        for candidate in pending {
            let granularity = candidate.granularity();
            let mut buckets: BTreeMap<Digest, Vec<usize>> = BTreeMap::new();
            for &i in candidate.members.iter().filter(|&i| !unreadable.contains(i)) {
                if let Some(d) = self.hasher.cached(&files[i].path, granularity) {
                    buckets.entry(d).or_default().push(i);
                }
            }

            for (digest, members) in buckets {
                if members.len() < 2 {
                    for &i in &members {
                        self.hasher.forget(&files[i].path);
                    }
                    continue;
                }
                if granularity == Granularity::Full {
                    for &i in &members {
                        self.hasher.forget(&files[i].path);
                    }
                    confirmed.push((digest, members));
                } else {
                    next.push(Candidate {
                        size: candidate.size,
                        members,
                        window: candidate.window.saturating_mul(self.plan.growth_factor),
                    });
                }
            }
        }
        next
    }
}

fn build_group(files: &[MediaFile], digest: Digest, members: &[usize]) -> DuplicateGroup {
    let mut sorted: Vec<&MediaFile> = members.iter().map(|&i| &files[i]).collect();
    sorted.sort_by(|a, b| keep_order(a, b));
    let survivor = sorted[0];
    let mut discards: Vec<PathBuf> = sorted[1..].iter().map(|f| f.path.clone()).collect();
    discards.sort();

    DuplicateGroup {
        digest: hex::encode(digest),
        size: survivor.size,
        survivor: survivor.path.clone(),
        survivor_date: survivor.date,
        discards,
    }
}
