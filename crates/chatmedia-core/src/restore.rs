use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::date::parse_filename_date;
use crate::metadata::{self, WriteOutcome};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum RestoreOutcome {
    Restored {
        date: NaiveDateTime,
        embedded: bool,
        file_times: bool,
    },
    AlreadyDated,
    /// Filename follows no known convention
    ParseMiss,
    Failed {
        error: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreEntry {
    pub path: PathBuf,
    pub outcome: RestoreOutcome,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RestoreReport {
    pub entries: Vec<RestoreEntry>,
}

impl RestoreReport {
    pub fn restored(&self) -> usize {
        self.count(|o| matches!(o, RestoreOutcome::Restored { .. }))
    }

    pub fn already_dated(&self) -> usize {
        self.count(|o| matches!(o, RestoreOutcome::AlreadyDated))
    }

    pub fn parse_misses(&self) -> usize {
        self.count(|o| matches!(o, RestoreOutcome::ParseMiss))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, RestoreOutcome::Failed { .. }))
    }

    fn count(&self, pred: impl Fn(&RestoreOutcome) -> bool) -> usize {
        self.entries.iter().filter(|e| pred(&e.outcome)).count()
    }
}

/// Restore the capture date of one file from its name.
pub fn restore_file(path: &Path, set_mtime: bool) -> RestoreOutcome {
    let Some(date) = path
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(parse_filename_date)
    else {
        return RestoreOutcome::ParseMiss;
    };

    match metadata::write_capture_date(path, date, set_mtime) {
        Ok(WriteOutcome::Written { embedded, file_times }) => RestoreOutcome::Restored {
            date,
            embedded,
            file_times,
        },
        Ok(WriteOutcome::AlreadyDated) => RestoreOutcome::AlreadyDated,
        Err(e) => RestoreOutcome::Failed { error: e.to_string() },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jpeg;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_restore_outcomes() {
        let dir = tempdir().unwrap();
        let img = dir.path().join("IMG-20210101-WA0001.jpg");
        fs::write(&img, jpeg::minimal_jpeg()).unwrap();
        let other = dir.path().join("holiday.jpg");
        fs::write(&other, jpeg::minimal_jpeg()).unwrap();
        let sticker = dir.path().join("STK-20210101-WA0001.webp");
        fs::write(&sticker, b"RIFF").unwrap();

        assert!(matches!(
            restore_file(&img, false),
            RestoreOutcome::Restored { embedded: true, file_times: false, .. }
        ));
        assert_eq!(restore_file(&img, false), RestoreOutcome::AlreadyDated);
        assert_eq!(restore_file(&other, false), RestoreOutcome::ParseMiss);
        assert!(matches!(restore_file(&sticker, false), RestoreOutcome::Failed { .. }));
        // parse miss wins over format problems, and the file is untouched
        assert_eq!(fs::read(&other).unwrap(), jpeg::minimal_jpeg());
    }
}
