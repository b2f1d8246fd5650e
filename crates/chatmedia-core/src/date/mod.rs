pub mod exif;
pub mod filename;

use chrono::{Local, NaiveDateTime};

pub use filename::parse_filename_date;

/// Unix timestamp for a naive (wall clock) date interpreted in local time.
///
/// Ambiguous local times take the earlier instant; times that fall into a DST
/// gap are read as UTC.
pub fn local_timestamp(date: NaiveDateTime) -> i64 {
    date.and_local_timezone(Local)
        .earliest()
        .map(|local| local.timestamp())
        .unwrap_or_else(|| date.and_utc().timestamp())
}

/// Exif `DateTime*` string form, `YYYY:MM:DD HH:MM:SS`.
pub fn exif_date_string(date: NaiveDateTime) -> String {
    date.format("%Y:%m:%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_exif_date_string() {
        let date = NaiveDate::from_ymd_opt(2021, 1, 5)
            .unwrap()
            .and_hms_opt(7, 8, 9)
            .unwrap();
        assert_eq!(exif_date_string(date), "2021:01:05 07:08:09");
    }

    #[test]
    fn test_local_timestamp_round_trips_wall_clock() {
        let date = NaiveDate::from_ymd_opt(2021, 6, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let ts = local_timestamp(date);
        let back = chrono::DateTime::from_timestamp(ts, 0)
            .unwrap()
            .with_timezone(&Local)
            .naive_local();
        assert_eq!(back, date);
    }
}
