use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::dedup::DuplicateGroup;
use crate::error::Error;

/// Reply to a per-group deletion prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Yes,
    No,
    /// Yes for this group and every later one
    All,
    /// No for this group and every later one
    Quit,
}

impl Answer {
    /// Parse a `[y/N/a/q]` reply; anything unrecognised is `No`.
    pub fn parse(reply: &str) -> Self {
        match reply.trim().to_lowercase().chars().next() {
            Some('y') => Answer::Yes,
            Some('a') => Answer::All,
            Some('q') => Answer::Quit,
            _ => Answer::No,
        }
    }
}

/// Asks whether a group's discards may be deleted.
pub trait Prompt {
    fn confirm(&mut self, group: &DuplicateGroup) -> Answer;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteMode {
    pub dry_run: bool,
    pub force: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "error")]
pub enum DeleteOutcome {
    Deleted,
    WouldDelete,
    Declined,
    Failed(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletionEntry {
    pub path: PathBuf,
    pub kept: PathBuf,
    pub outcome: DeleteOutcome,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeletionReport {
    pub entries: Vec<DeletionEntry>,
    pub bytes_freed: u64,
}

impl DeletionReport {
    pub fn count(&self, outcome: &DeleteOutcome) -> usize {
        self.entries
            .iter()
            .filter(|e| std::mem::discriminant(&e.outcome) == std::mem::discriminant(outcome))
            .count()
    }

    pub fn deleted(&self) -> usize {
        self.count(&DeleteOutcome::Deleted)
    }

    pub fn failed(&self) -> usize {
        self.count(&DeleteOutcome::Failed(String::new()))
    }
}

/// Remove the discards of each group according to `mode`.
///
/// Survivors are never touched, and a group whose survivor has vanished since
/// the scan keeps all its files. A failed removal is recorded and the run
/// moves on; nothing already deleted is restored.
pub fn execute(groups: &[DuplicateGroup], mode: DeleteMode, prompt: &mut dyn Prompt) -> DeletionReport {
    let mut report = DeletionReport::default();
    let mut approve_all = mode.force;
    let mut stopped = false;

    for group in groups {
        if !mode.dry_run && !group.survivor.exists() {
            // never remove the last remaining copies
            let error = format!("kept file {} no longer exists", group.survivor.display());
            log::warn!("{}, leaving its duplicates", error);
            for path in &group.discards {
                report.entries.push(DeletionEntry {
                    path: path.clone(),
                    kept: group.survivor.clone(),
                    outcome: DeleteOutcome::Failed(error.clone()),
                });
            }
            continue;
        }
        log::info!("Keeping: {}", group.survivor.display());

        let approved = if mode.dry_run || stopped {
            false
        } else if approve_all {
            true
        } else {
            match prompt.confirm(group) {
                Answer::Yes => true,
                Answer::No => false,
                Answer::All => {
                    approve_all = true;
                    true
                }
                Answer::Quit => {
                    stopped = true;
                    false
                }
            }
        };

        for path in &group.discards {
            let outcome = if mode.dry_run {
                log::info!("Would delete: {}", path.display());
                DeleteOutcome::WouldDelete
            } else if !approved {
                DeleteOutcome::Declined
            } else {
                match fs::remove_file(path) {
                    Ok(()) => {
                        log::info!("Deleting: {}", path.display());
                        report.bytes_freed += group.size;
                        DeleteOutcome::Deleted
                    }
                    Err(source) => {
                        let err = Error::Delete {
                            path: path.clone(),
                            source,
                        };
                        log::warn!("{}", err);
                        DeleteOutcome::Failed(err.to_string())
                    }
                }
            };
            report.entries.push(DeletionEntry {
                path: path.clone(),
                kept: group.survivor.clone(),
                outcome,
            });
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::path::Path;
    use tempfile::tempdir;

    /// Replays canned answers and records which groups were asked about.
    struct Scripted {
        answers: VecDeque<Answer>,
        asked: Vec<PathBuf>,
    }

    impl Scripted {
        fn new(answers: &[Answer]) -> Self {
            Self {
                answers: answers.iter().copied().collect(),
                asked: Vec::new(),
            }
        }
    }

    impl Prompt for Scripted {
        fn confirm(&mut self, group: &DuplicateGroup) -> Answer {
            self.asked.push(group.survivor.clone());
            self.answers.pop_front().unwrap_or(Answer::No)
        }
    }

    fn group(dir: &Path, survivor: &str, discards: &[&str]) -> DuplicateGroup {
        for name in std::iter::once(&survivor).chain(discards) {
            fs::write(dir.join(name), b"dup").unwrap();
        }
        DuplicateGroup {
            digest: String::new(),
            size: 3,
            survivor: dir.join(survivor),
            survivor_date: None,
            discards: discards.iter().map(|d| dir.join(d)).collect(),
        }
    }

    fn file_count(dir: &Path) -> usize {
        fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn test_answer_parse() {
        assert_eq!(Answer::parse("y"), Answer::Yes);
        assert_eq!(Answer::parse(" Yes\n"), Answer::Yes);
        assert_eq!(Answer::parse("A"), Answer::All);
        assert_eq!(Answer::parse("q"), Answer::Quit);
        assert_eq!(Answer::parse(""), Answer::No);
        assert_eq!(Answer::parse("maybe"), Answer::No);
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let dir = tempdir().unwrap();
        let groups = vec![group(dir.path(), "a.jpg", &["a1.jpg", "a2.jpg"])];
        let mut prompt = Scripted::new(&[Answer::Yes]);

        let report = execute(
            &groups,
            DeleteMode {
                dry_run: true,
                force: true,
            },
            &mut prompt,
        );
        assert_eq!(file_count(dir.path()), 3);
        assert_eq!(report.count(&DeleteOutcome::WouldDelete), 2);
        assert_eq!(report.bytes_freed, 0);
        assert!(prompt.asked.is_empty());
    }

    #[test]
    fn test_force_deletes_without_prompting() {
        let dir = tempdir().unwrap();
        let groups = vec![
            group(dir.path(), "a.jpg", &["a1.jpg"]),
            group(dir.path(), "b.jpg", &["b1.jpg", "b2.jpg"]),
        ];
        let mut prompt = Scripted::new(&[]);

        let report = execute(
            &groups,
            DeleteMode {
                dry_run: false,
                force: true,
            },
            &mut prompt,
        );
        assert_eq!(report.deleted(), 3);
        assert_eq!(report.bytes_freed, 9);
        assert!(prompt.asked.is_empty());
        assert!(dir.path().join("a.jpg").exists());
        assert!(dir.path().join("b.jpg").exists());
        assert_eq!(file_count(dir.path()), 2);
    }

    #[test]
    fn test_prompt_answers() {
        let dir = tempdir().unwrap();
        let groups = vec![
            group(dir.path(), "a.jpg", &["a1.jpg"]),
            group(dir.path(), "b.jpg", &["b1.jpg"]),
            group(dir.path(), "c.jpg", &["c1.jpg"]),
            group(dir.path(), "d.jpg", &["d1.jpg"]),
        ];
        let mut prompt = Scripted::new(&[Answer::No, Answer::Yes, Answer::Quit]);

        let report = execute(&groups, DeleteMode::default(), &mut prompt);
        assert_eq!(prompt.asked.len(), 3);
        assert!(dir.path().join("a1.jpg").exists());
        assert!(!dir.path().join("b1.jpg").exists());
        assert!(dir.path().join("c1.jpg").exists());
        assert!(dir.path().join("d1.jpg").exists());
        assert_eq!(report.deleted(), 1);
        assert_eq!(report.count(&DeleteOutcome::Declined), 3);
    }

    #[test]
    fn test_answer_all_stops_prompting() {
        let dir = tempdir().unwrap();
        let groups = vec![
            group(dir.path(), "a.jpg", &["a1.jpg"]),
            group(dir.path(), "b.jpg", &["b1.jpg"]),
        ];
        let mut prompt = Scripted::new(&[Answer::All]);

        let report = execute(&groups, DeleteMode::default(), &mut prompt);
        assert_eq!(prompt.asked.len(), 1);
        assert_eq!(report.deleted(), 2);
    }

    #[test]
    fn test_failed_delete_does_not_abort() {
        let dir = tempdir().unwrap();
        let mut first = group(dir.path(), "a.jpg", &["a1.jpg"]);
        first.discards.insert(0, dir.path().join("already-gone.jpg"));
        let groups = vec![first, group(dir.path(), "b.jpg", &["b1.jpg"])];

        let report = execute(
            &groups,
            DeleteMode {
                dry_run: false,
                force: true,
            },
            &mut Scripted::new(&[]),
        );
        assert_eq!(report.failed(), 1);
        assert_eq!(report.deleted(), 2);
        assert!(!dir.path().join("b1.jpg").exists());
    }

    #[test]
    fn test_missing_survivor_keeps_discards() {
        let dir = tempdir().unwrap();
        let groups = vec![
            group(dir.path(), "a.jpg", &["a1.jpg", "a2.jpg"]),
            group(dir.path(), "b.jpg", &["b1.jpg"]),
        ];
        fs::remove_file(dir.path().join("a.jpg")).unwrap();
        let mut prompt = Scripted::new(&[]);

        let report = execute(
            &groups,
            DeleteMode {
                dry_run: false,
                force: true,
            },
            &mut prompt,
        );
        assert_eq!(report.failed(), 2);
        assert_eq!(report.deleted(), 1);
        assert!(dir.path().join("a1.jpg").exists());
        assert!(dir.path().join("a2.jpg").exists());
        assert!(!dir.path().join("b1.jpg").exists());
        assert_eq!(report.bytes_freed, 3);
    }
}
