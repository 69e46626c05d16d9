use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Utc};

/// India Standard Time, UTC+05:30. Fixed; India observes no DST.
pub const IST_OFFSET_MINUTES: i32 = 330;

/// Inclusive bounds of one local day, in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

pub fn offset_from_minutes(minutes: i32) -> Option<FixedOffset> {
    FixedOffset::east_opt(minutes.checked_mul(60)?)
}

/// Calendar date of `now` as seen at `offset`.
pub fn local_date(now: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    now.with_timezone(&offset).date_naive()
}

/// Start (00:00:00.000) and end (23:59:59.999) of the day containing `now`
/// at `offset`, shifted back to UTC for comparison against stored timestamps.
pub fn day_range(now: DateTime<Utc>, offset: FixedOffset) -> DayRange {
    let shift = Duration::seconds(i64::from(offset.local_minus_utc()));

    let local_start = (now.naive_utc() + shift).date().and_time(NaiveTime::MIN);
    let local_end = local_start + Duration::days(1) - Duration::milliseconds(1);

    DayRange {
        start: (local_start - shift).and_utc(),
        end: (local_end - shift).and_utc(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ist() -> FixedOffset {
        offset_from_minutes(IST_OFFSET_MINUTES).unwrap()
    }

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn evening_utc_already_belongs_to_next_ist_day() {
        let range = day_range(utc("2024-03-01T20:00:00Z"), ist());

        assert_eq!(range.start, utc("2024-03-01T18:30:00Z"));
        assert_eq!(range.end, utc("2024-03-02T18:29:59.999Z"));
    }

    #[test]
    fn morning_utc_stays_on_same_ist_day() {
        let range = day_range(utc("2024-03-01T05:00:00Z"), ist());

        assert_eq!(range.start, utc("2024-02-29T18:30:00Z"));
        assert_eq!(range.end, utc("2024-03-01T18:29:59.999Z"));
    }

    #[test]
    fn boundary_instant_opens_a_new_day() {
        let range = day_range(utc("2024-03-01T18:30:00Z"), ist());
        assert_eq!(range.start, utc("2024-03-01T18:30:00Z"));

        let before = day_range(utc("2024-03-01T18:29:59.999Z"), ist());
        assert_eq!(before.end, utc("2024-03-01T18:29:59.999Z"));
    }

    #[test]
    fn range_spans_one_day_minus_a_millisecond() {
        let now = Utc.with_ymd_and_hms(2024, 12, 31, 23, 0, 0).unwrap();
        let range = day_range(now, ist());

        assert_eq!(range.end - range.start, Duration::days(1) - Duration::milliseconds(1));
        assert!(range.start <= now && now <= range.end);
    }

    #[test]
    fn local_date_follows_offset() {
        let now = utc("2024-12-31T19:00:00Z");
        assert_eq!(local_date(now, ist()), NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert!(offset_from_minutes(24 * 60).is_none());
    }
}
