use chrono::{NaiveDate, NaiveDateTime};
use regex::{Captures, Regex};
use std::path::Path;
use std::sync::LazyLock;

struct NamePattern {
    regex: &'static LazyLock<Regex>,
    parse: fn(&Captures) -> Option<NaiveDateTime>,
}

// IMG-20210101-WA0001.jpg, VID-20210101-WA0002.mp4, PTT-20210101-WA0003.opus
static RE_WA_MOBILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:IMG|VID|AUD|PTT|STK|DOC)-(?P<date>\d{8})-WA\d+").unwrap()
});
// WhatsApp Image 2021-01-01 at 13.04.55.jpeg, WhatsApp Video 2021-01-01 at 1.04.55 PM.mp4
static RE_WA_DESKTOP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^WhatsApp (?:Image|Video|Audio) (?P<date>\d{4}-\d{2}-\d{2}) at (?P<time>\d{1,2}\.\d{2}\.\d{2})(?: (?P<ampm>[AP]M))?",
    )
    .unwrap()
});
// signal-2020-10-26-163832.jpg
static RE_SIGNAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^signal-(?P<date>\d{4}-\d{2}-\d{2}-\d{6})").unwrap());

static PATTERNS: &[NamePattern] = &[
    NamePattern { regex: &RE_WA_MOBILE, parse: parse_wa_mobile },
    NamePattern { regex: &RE_WA_DESKTOP, parse: parse_wa_desktop },
    NamePattern { regex: &RE_SIGNAL, parse: parse_signal },
];

fn parse_wa_mobile(caps: &Captures) -> Option<NaiveDateTime> {
    let date = NaiveDate::parse_from_str(caps.name("date")?.as_str(), "%Y%m%d").ok()?;
    date.and_hms_opt(0, 0, 0)
}

fn parse_wa_desktop(caps: &Captures) -> Option<NaiveDateTime> {
    let date = caps.name("date")?.as_str();
    let time = caps.name("time")?.as_str();
    match caps.name("ampm") {
        Some(ampm) => NaiveDateTime::parse_from_str(
            &format!("{} {} {}", date, time, ampm.as_str()),
            "%Y-%m-%d %I.%M.%S %p",
        )
        .ok(),
        None => NaiveDateTime::parse_from_str(&format!("{} {}", date, time), "%Y-%m-%d %H.%M.%S").ok(),
    }
}

fn parse_signal(caps: &Captures) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(caps.name("date")?.as_str(), "%Y-%m-%d-%H%M%S").ok()
}

/// Recover the capture date encoded in a chat-export filename.
///
/// Only the final path component is inspected. `None` means the name follows
/// no known convention (or encodes an impossible date); nothing is guessed.
pub fn parse_filename_date(filename: &str) -> Option<NaiveDateTime> {
    let basename = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(filename);

    PATTERNS.iter().find_map(|pat| {
        let caps = pat.regex.captures(basename)?;
        (pat.parse)(&caps)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn test_whatsapp_mobile() {
        assert_eq!(
            parse_filename_date("IMG-20210101-WA0001.jpg"),
            Some(dt(2021, 1, 1, 0, 0, 0))
        );
        assert_eq!(
            parse_filename_date("VID-20191231-WA0042.mp4"),
            Some(dt(2019, 12, 31, 0, 0, 0))
        );
        assert_eq!(
            parse_filename_date("PTT-20200229-WA0003.opus"),
            Some(dt(2020, 2, 29, 0, 0, 0))
        );
        assert_eq!(
            parse_filename_date("/media/WhatsApp Images/Sent/IMG-20210105-WA0002 (1).jpg"),
            Some(dt(2021, 1, 5, 0, 0, 0))
        );
    }

    #[test]
    fn test_whatsapp_desktop() {
        assert_eq!(
            parse_filename_date("WhatsApp Image 2021-03-04 at 13.04.55.jpeg"),
            Some(dt(2021, 3, 4, 13, 4, 55))
        );
        assert_eq!(
            parse_filename_date("WhatsApp Video 2021-03-04 at 1.04.55 PM.mp4"),
            Some(dt(2021, 3, 4, 13, 4, 55))
        );
        assert_eq!(
            parse_filename_date("WhatsApp Image 2021-03-04 at 12.00.01 AM.jpeg"),
            Some(dt(2021, 3, 4, 0, 0, 1))
        );
    }

    #[test]
    fn test_signal() {
        assert_eq!(
            parse_filename_date("signal-2020-10-26-163832.jpg"),
            Some(dt(2020, 10, 26, 16, 38, 32))
        );
    }

    #[test]
    fn test_parse_miss() {
        assert_eq!(parse_filename_date("random_photo.jpg"), None);
        assert_eq!(parse_filename_date(""), None);
        assert_eq!(parse_filename_date("IMG_20190509_154733.jpg"), None);
        assert_eq!(parse_filename_date("IMG-2021010-WA0001.jpg"), None);
        // prefix must start the name
        assert_eq!(parse_filename_date("copy of IMG-20210101-WA0001.jpg"), None);
    }

    #[test]
    fn test_impossible_dates_are_misses() {
        assert_eq!(parse_filename_date("IMG-20211301-WA0001.jpg"), None);
        assert_eq!(parse_filename_date("IMG-20210230-WA0001.jpg"), None);
        assert_eq!(parse_filename_date("WhatsApp Image 2021-03-04 at 25.04.55.jpeg"), None);
        assert_eq!(parse_filename_date("signal-2020-10-26-996832.jpg"), None);
    }
}
