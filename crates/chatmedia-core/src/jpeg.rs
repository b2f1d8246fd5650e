//! Minimal JPEG marker walking, enough to swap the Exif APP1 segment.

use thiserror::Error;

const MARKER_PREFIX: u8 = 0xFF;
const SOI: u8 = 0xD8;
const EOI: u8 = 0xD9;
const SOS: u8 = 0xDA;
const APP0: u8 = 0xE0;
const APP1: u8 = 0xE1;
const EXIF_HEADER: &[u8] = b"Exif\0\0";
const MAX_SEGMENT_PAYLOAD: usize = u16::MAX as usize - 2;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum JpegError {
    #[error("missing JPEG start-of-image marker")]
    NotJpeg,
    #[error("truncated or corrupt JPEG segment at offset {0}")]
    Corrupt(usize),
    #[error("Exif block of {0} bytes does not fit in one APP1 segment")]
    ExifTooLarge(usize),
}

struct Segment {
    marker: u8,
    start: usize,
    payload: usize,
    end: usize,
}

impl Segment {
    fn is_exif(&self, data: &[u8]) -> bool {
        self.marker == APP1 && data[self.payload..self.end].starts_with(EXIF_HEADER)
    }
}

/// Walk the header segments up to start-of-scan. Returns them together with
/// the offset where the entropy-coded remainder begins.
fn header_segments(data: &[u8]) -> Result<(Vec<Segment>, usize), JpegError> {
    if data.len() < 2 || data[0] != MARKER_PREFIX || data[1] != SOI {
        return Err(JpegError::NotJpeg);
    }

    let mut segments = Vec::new();
    let mut pos = 2;
    loop {
        if pos >= data.len() || data[pos] != MARKER_PREFIX {
            return Err(JpegError::Corrupt(pos));
        }
        // fill bytes
        let mut marker_pos = pos + 1;
        while marker_pos < data.len() && data[marker_pos] == MARKER_PREFIX {
            marker_pos += 1;
        }
        let Some(&marker) = data.get(marker_pos) else {
            return Err(JpegError::Corrupt(pos));
        };
        if marker == SOS || marker == EOI {
            return Ok((segments, pos));
        }
        // standalone markers carry no length
        if marker == 0x01 || (0xD0..=0xD7).contains(&marker) {
            pos = marker_pos + 1;
            continue;
        }
        let len_at = marker_pos + 1;
        if len_at + 2 > data.len() {
            return Err(JpegError::Corrupt(pos));
        }
        let len = u16::from_be_bytes([data[len_at], data[len_at + 1]]) as usize;
        let end = len_at + len;
        if len < 2 || end > data.len() {
            return Err(JpegError::Corrupt(pos));
        }
        segments.push(Segment {
            marker,
            start: pos,
            payload: len_at + 2,
            end,
        });
        pos = end;
    }
}

/// Check that `data` starts like a JPEG and its header segments are well formed.
pub fn validate(data: &[u8]) -> Result<(), JpegError> {
    header_segments(data).map(|_| ())
}

/// Rebuild `data` with `tiff` as its only Exif APP1 segment.
///
/// The new segment goes right after SOI, or after a leading JFIF APP0 if
/// present. Any previous Exif segments are dropped; everything else is kept
/// byte for byte.
pub fn replace_exif(data: &[u8], tiff: &[u8]) -> Result<Vec<u8>, JpegError> {
    let payload_len = EXIF_HEADER.len() + tiff.len();
    if payload_len > MAX_SEGMENT_PAYLOAD {
        return Err(JpegError::ExifTooLarge(tiff.len()));
    }
    let (segments, scan_start) = header_segments(data)?;

    let mut out = Vec::with_capacity(data.len() + payload_len + 4);
    out.extend_from_slice(&[MARKER_PREFIX, SOI]);

    let mut rest = segments.iter().filter(|s| !s.is_exif(data)).peekable();
    if let Some(app0) = rest.next_if(|s| s.marker == APP0) {
        out.extend_from_slice(&data[app0.start..app0.end]);
    }

    out.extend_from_slice(&[MARKER_PREFIX, APP1]);
    out.extend_from_slice(&((payload_len + 2) as u16).to_be_bytes());
    out.extend_from_slice(EXIF_HEADER);
    out.extend_from_slice(tiff);

    for segment in rest {
        out.extend_from_slice(&data[segment.start..segment.end]);
    }
    out.extend_from_slice(&data[scan_start..]);
    Ok(out)
}

/// SOI, JFIF APP0, a one-component SOS header, two scan bytes and EOI.
#[cfg(test)]
pub(crate) fn minimal_jpeg() -> Vec<u8> {
    let mut data = vec![0xFF, 0xD8];
    data.extend_from_slice(&[
        0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00, 0x01, 0x01, 0x00, 0x00, 0x01, 0x00,
        0x01, 0x00, 0x00,
    ]);
    data.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x08, 0x01, 0x01, 0x00, 0x00, 0x3F, 0x00]);
    data.extend_from_slice(&[0x12, 0x34]);
    data.extend_from_slice(&[0xFF, 0xD9]);
    data
}
