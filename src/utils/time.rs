use chrono::{NaiveDate, NaiveTime, Timelike};

const DATE_PREFIX_LEN: usize = "YYYY-MM-DD".len();

/// This is the standard way of converting a date to a string in wordwhen. Used for day keys in
/// exports and for matching daily note names.
pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Extracts the date a daily note is named after. The name has to start with a strict
/// `YYYY-MM-DD` that is also a real calendar date, so `2024-1-5` or `2024-02-30` don't match.
pub fn date_prefix(name: &str) -> Option<NaiveDate> {
    let prefix = name.as_bytes().get(..DATE_PREFIX_LEN)?;
    let well_formed = prefix.iter().enumerate().all(|(i, b)| match i {
        4 | 7 => *b == b'-',
        _ => b.is_ascii_digit(),
    });
    if !well_formed {
        return None;
    }
    // Prefix is pure ascii at this point, so slicing the str is safe.
    NaiveDate::parse_from_str(&name[..DATE_PREFIX_LEN], "%Y-%m-%d").ok()
}

/// Formats a time of day the way people say it: `12am`, `9am`, `2:30pm`.
pub fn twelve_hour_label(time: NaiveTime) -> String {
    let (is_pm, hour) = time.hour12();
    let suffix = if is_pm { "pm" } else { "am" };
    match time.minute() {
        0 => format!("{hour}{suffix}"),
        minute => format!("{hour}:{minute:02}{suffix}"),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime};

    use super::{date_key, date_prefix, twelve_hour_label};

    #[test]
    fn test_date_prefix_matches_daily_notes() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 15);
        assert_eq!(date_prefix("2024-01-15"), expected);
        assert_eq!(date_prefix("2024-01-15 Notes"), expected);
        assert_eq!(date_prefix("2024-01-15-evening"), expected);
    }

    #[test]
    fn test_date_prefix_is_strict() {
        assert_eq!(date_prefix("Notes 2024-01-15"), None);
        assert_eq!(date_prefix("2024-1-15"), None);
        assert_eq!(date_prefix("2024-02-30"), None);
        assert_eq!(date_prefix("2024/01/15"), None);
        assert_eq!(date_prefix("2024-01"), None);
        assert_eq!(date_prefix(""), None);
    }

    #[test]
    fn test_date_prefix_non_ascii_name() {
        assert_eq!(date_prefix("日記 2024-01-15"), None);
    }

    #[test]
    fn test_date_key() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(date_key(date), "2024-03-09");
    }

    #[test]
    fn test_twelve_hour_label() {
        let label = |h, m| twelve_hour_label(NaiveTime::from_hms_opt(h, m, 0).unwrap());
        assert_eq!(label(0, 0), "12am");
        assert_eq!(label(0, 30), "12:30am");
        assert_eq!(label(9, 0), "9am");
        assert_eq!(label(12, 0), "12pm");
        assert_eq!(label(14, 30), "2:30pm");
        assert_eq!(label(23, 30), "11:30pm");
    }
}
