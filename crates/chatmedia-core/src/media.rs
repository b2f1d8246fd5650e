use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use mime_guess::mime;

use crate::date::parse_filename_date;

/// How a file can carry its capture date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// JPEG: date goes into the embedded Exif block.
    Jpeg,
    /// Images without an Exif writer here (png, webp, gif, ...).
    OtherImage,
    Video,
    Audio,
    Other,
}

impl MediaKind {
    pub fn from_path(path: &Path) -> Self {
        let Some(guess) = mime_guess::from_path(path).first() else {
            return MediaKind::Other;
        };
        let type_ = guess.type_();
        if type_ == mime::IMAGE {
            if guess.subtype() == mime::JPEG {
                MediaKind::Jpeg
            } else {
                MediaKind::OtherImage
            }
        } else if type_ == mime::VIDEO {
            MediaKind::Video
        } else if type_ == mime::AUDIO {
            MediaKind::Audio
        } else {
            MediaKind::Other
        }
    }

    /// Formats whose only date carrier is the filesystem timestamps.
    pub fn uses_file_times(self) -> bool {
        matches!(self, MediaKind::Video | MediaKind::Audio)
    }
}

/// A file discovered during a scan.
///
/// Content hashes are not stored here; they live in the hasher's memo table
/// keyed by path and granularity.
#[derive(Debug, Clone)]
pub struct MediaFile {
    /// Unique key within a scan
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Capture date encoded in the filename, if any
    pub date: Option<NaiveDateTime>,
}

impl MediaFile {
    pub fn new(path: PathBuf, size: u64) -> Self {
        let date = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(parse_filename_date);
        Self { path, size, date }
    }

    /// Stat `path` and build the record.
    pub fn from_path(path: PathBuf) -> io::Result<Self> {
        let size = fs::metadata(&path)?.len();
        Ok(Self::new(path, size))
    }

    /// Character count of the file name without its extension.
    pub fn name_len(&self) -> usize {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().chars().count())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_kind() {
        assert_eq!(MediaKind::from_path(Path::new("IMG-20210101-WA0001.jpg")), MediaKind::Jpeg);
        assert_eq!(MediaKind::from_path(Path::new("a.JPEG")), MediaKind::Jpeg);
        assert_eq!(MediaKind::from_path(Path::new("STK-20210101-WA0001.webp")), MediaKind::OtherImage);
        assert_eq!(MediaKind::from_path(Path::new("VID-20210101-WA0001.mp4")), MediaKind::Video);
        assert_eq!(MediaKind::from_path(Path::new("VID-20210101-WA0001.3gp")), MediaKind::Video);
        assert_eq!(MediaKind::from_path(Path::new("notes.txt")), MediaKind::Other);
        assert_eq!(MediaKind::from_path(Path::new("no_extension")), MediaKind::Other);
        assert!(MediaKind::Video.uses_file_times());
        assert!(!MediaKind::Jpeg.uses_file_times());
    }

    #[test]
    fn test_media_file_parses_name() {
        let m = MediaFile::new(PathBuf::from("/x/IMG-20210101-WA0001.jpg"), 10);
        assert!(m.date.is_some());
        assert_eq!(m.name_len(), "IMG-20210101-WA0001".len());

        let m = MediaFile::new(PathBuf::from("/x/holiday.jpg"), 10);
        assert!(m.date.is_none());
        assert_eq!(m.name_len(), 7);
    }
}
