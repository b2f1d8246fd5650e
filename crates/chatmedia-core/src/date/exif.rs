use chrono::NaiveDateTime;
use exif::experimental::Writer;
use exif::{Exif, Field, In, Reader, Tag, Value};
use std::io::Cursor;

use super::exif_date_string;

/// Tags that are regenerated by the writer or hold offsets into data that is
/// not carried over. `MakerNote` is vendor data addressed by absolute offsets,
/// so it cannot survive a re-layout of the block.
const DROPPED_TAGS: &[Tag] = &[
    Tag::ExifIFDPointer,
    Tag::GPSInfoIFDPointer,
    Tag::InteropIFDPointer,
    Tag::MakerNote,
    Tag::DateTimeOriginal,
];

/// Parse the Exif block of an image held in memory.
pub fn read_exif(bytes: &[u8]) -> Option<Exif> {
    Reader::new().read_from_container(&mut Cursor::new(bytes)).ok()
}

/// The capture date already recorded in `DateTimeOriginal`, if it is readable.
/// EXIF datetimes have no timezone info - they are local time as-is.
pub fn date_time_original(exif: &Exif) -> Option<NaiveDateTime> {
    let field = exif.get_field(Tag::DateTimeOriginal, In::PRIMARY)?;
    parse_exif_datetime(&field.display_value().to_string())
}

fn parse_exif_datetime(s: &str) -> Option<NaiveDateTime> {
    let cleaned = s
        .trim_matches(|c: char| c == '"' || c.is_whitespace())
        .replace('-', ":")
        .replace('/', ":");

    NaiveDateTime::parse_from_str(&cleaned, "%Y:%m:%d %H:%M:%S").ok()
}

/// Fields and thumbnail of an existing block that a rewrite carries over.
struct Carried<'a> {
    fields: Vec<&'a Field>,
    little_endian: bool,
    thumbnail: Option<&'a [u8]>,
}

impl<'a> Carried<'a> {
    fn from_exif(exif: &'a Exif) -> Self {
        let thumbnail = jpeg_thumbnail(exif);
        let fields = exif
            .fields()
            .filter(|f| match f.ifd_num {
                In::PRIMARY => true,
                // thumbnail tags are meaningless without the image they describe
                In::THUMBNAIL => thumbnail.is_some(),
                _ => false,
            })
            .filter(|f| !DROPPED_TAGS.contains(&f.tag))
            .collect();
        Self {
            fields,
            little_endian: exif.little_endian(),
            thumbnail,
        }
    }

    fn fresh() -> Self {
        Self {
            fields: Vec::new(),
            little_endian: false,
            thumbnail: None,
        }
    }
}

/// The embedded JPEG thumbnail of IFD1, if there is one inside the block.
fn jpeg_thumbnail(exif: &Exif) -> Option<&[u8]> {
    let offset = exif
        .get_field(Tag::JPEGInterchangeFormat, In::THUMBNAIL)?
        .value
        .get_uint(0)? as usize;
    let len = exif
        .get_field(Tag::JPEGInterchangeFormatLength, In::THUMBNAIL)?
        .value
        .get_uint(0)? as usize;
    exif.buf().get(offset..offset.checked_add(len)?)
}

/// Encode a TIFF-structured Exif block carrying `date` as `DateTimeOriginal`.
///
/// Primary-image fields and a JPEG thumbnail of `existing` are preserved. If
/// they cannot be re-encoded, a fresh block holding only the date is produced
/// instead.
pub fn encode_with_date(existing: Option<&Exif>, date: NaiveDateTime) -> Result<Vec<u8>, exif::Error> {
    let carried = existing.map(Carried::from_exif).unwrap_or_else(Carried::fresh);
    encode_or_fresh(&carried, date)
}

fn encode_or_fresh(carried: &Carried<'_>, date: NaiveDateTime) -> Result<Vec<u8>, exif::Error> {
    if carried.fields.is_empty() && carried.thumbnail.is_none() {
        return encode(&Carried::fresh(), date);
    }
    match encode(carried, date) {
        Ok(block) => Ok(block),
        Err(e) => {
            log::warn!("Existing Exif cannot be re-encoded ({}), writing a fresh block", e);
            encode(&Carried::fresh(), date)
        }
    }
}

fn encode(carried: &Carried<'_>, date: NaiveDateTime) -> Result<Vec<u8>, exif::Error> {
    let date_field = Field {
        tag: Tag::DateTimeOriginal,
        ifd_num: In::PRIMARY,
        value: Value::Ascii(vec![exif_date_string(date).into_bytes()]),
    };

    let mut writer = Writer::new();
    for &field in &carried.fields {
        writer.push_field(field);
    }
    writer.push_field(&date_field);
    if let Some(thumbnail) = carried.thumbnail {
        writer.set_jpeg(thumbnail, In::THUMBNAIL);
    }

    let mut buf = Cursor::new(Vec::new());
    writer.write(&mut buf, carried.little_endian)?;
    Ok(buf.into_inner())
}
