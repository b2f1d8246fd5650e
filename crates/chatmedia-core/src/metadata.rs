use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use filetime::FileTime;
use serde::{Deserialize, Serialize};

use crate::date::{self, exif};
use crate::error::{Error, Result};
use crate::jpeg;
use crate::media::MediaKind;

/// What a successful metadata write touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteOutcome {
    Written {
        /// Date stored in the embedded Exif block
        embedded: bool,
        /// Filesystem modified/access times set to the date
        file_times: bool,
    },
    /// The JPEG already has a readable `DateTimeOriginal`; nothing was changed.
    AlreadyDated,
}

/// Store `date` as the capture date of the file at `path`.
///
/// JPEGs get `DateTimeOriginal` in their Exif block, and with `set_mtime`
/// also the file times. Video and audio formats have no embedded date we
/// write, so only their file times are set. Other formats are rejected.
pub fn write_capture_date(path: &Path, date: NaiveDateTime, set_mtime: bool) -> Result<WriteOutcome> {
    match MediaKind::from_path(path) {
        MediaKind::Jpeg => write_jpeg(path, date, set_mtime),
        kind if kind.uses_file_times() => {
            set_file_times(path, date)?;
            Ok(WriteOutcome::Written {
                embedded: false,
                file_times: true,
            })
        }
        _ => Err(Error::UnsupportedFormat {
            path: path.to_path_buf(),
            reason: "format cannot hold a capture date".to_string(),
        }),
    }
}

fn write_jpeg(path: &Path, date: NaiveDateTime, set_mtime: bool) -> Result<WriteOutcome> {
    let write_err = |source: io::Error| Error::Write {
        path: path.to_path_buf(),
        source,
    };
    let unsupported = |reason: String| Error::UnsupportedFormat {
        path: path.to_path_buf(),
        reason,
    };

    let bytes = fs::read(path).map_err(write_err)?;
    jpeg::validate(&bytes).map_err(|e| unsupported(e.to_string()))?;

    let existing = exif::read_exif(&bytes);
    if existing.as_ref().and_then(exif::date_time_original).is_some() {
        return Ok(WriteOutcome::AlreadyDated);
    }

    let block = exif::encode_with_date(existing.as_ref(), date)
        .map_err(|e| unsupported(format!("cannot encode Exif: {}", e)))?;
    let updated = jpeg::replace_exif(&bytes, &block).map_err(|e| unsupported(e.to_string()))?;

    let metadata = fs::metadata(path).map_err(write_err)?;
    replace_contents(path, &updated, &metadata).map_err(write_err)?;

    if set_mtime {
        set_file_times(path, date)?;
    } else {
        // rewriting the file must not itself move its timestamps
        let atime = FileTime::from_last_access_time(&metadata);
        let mtime = FileTime::from_last_modification_time(&metadata);
        filetime::set_file_times(path, atime, mtime).map_err(write_err)?;
    }

    Ok(WriteOutcome::Written {
        embedded: true,
        file_times: set_mtime,
    })
}

/// Write next to the target and rename over it, so a failure never leaves a
/// half-written image behind.
fn replace_contents(path: &Path, contents: &[u8], original: &fs::Metadata) -> io::Result<()> {
    let temp_path = temp_sibling(path);
    let result = fs::write(&temp_path, contents)
        .and_then(|_| fs::set_permissions(&temp_path, original.permissions()))
        .and_then(|_| fs::rename(&temp_path, path));
    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.chatmedia.tmp", name))
}

/// Set both access and modified time to `date` read as local time.
pub fn set_file_times(path: &Path, date: NaiveDateTime) -> Result<()> {
    let ft = FileTime::from_unix_time(date::local_timestamp(date), 0);
    filetime::set_file_times(path, ft, ft).map_err(|source| Error::Write {
        path: path.to_path_buf(),
        source,
    })
}
