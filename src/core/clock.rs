use chrono::{DateTime, Local};
use uuid::{NoContext, Timestamp, Uuid};

/// Wall-clock source for history timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Frozen clock for tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Local>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Local> {
        self.0
    }
}

pub const RECORD_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Time-ordered id: `<prefix>-` followed by a UUIDv7 for `at`.
pub fn prefixed_id(prefix: &str, at: DateTime<Local>) -> String {
    let secs = at.timestamp().max(0) as u64;
    let ts = Timestamp::from_unix(NoContext, secs, at.timestamp_subsec_nanos());
    format!("{prefix}-{}", Uuid::new_v7(ts))
}

/// Backup history id, `h-<uuid>`.
pub fn record_id(at: DateTime<Local>) -> String {
    prefixed_id("h", at)
}

pub fn record_date(at: DateTime<Local>) -> String {
    at.format(RECORD_DATE_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn record_ids_sort_by_time() {
        let early = Local.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let late = Local.with_ymd_and_hms(2024, 3, 1, 9, 0, 5).unwrap();

        let a = record_id(early);
        let b = record_id(late);
        assert!(a.starts_with("h-"));
        assert!(a < b);
    }

    #[test]
    fn record_date_is_human_readable() {
        let at = Local.with_ymd_and_hms(2024, 3, 1, 14, 30, 7).unwrap();
        assert_eq!(record_date(at), "2024-03-01 14:30:07");
    }
}
