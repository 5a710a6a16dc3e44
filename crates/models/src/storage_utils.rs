//! Key helpers shared by table entities.

use chrono::{DateTime, Utc};

/// 100ns ticks between 0001-01-01 and the Unix epoch.
const UNIX_EPOCH_TICKS: i64 = 621_355_968_000_000_000;
/// Ticks of 9999-12-31T23:59:59.9999999.
const MAX_TICKS: i64 = 3_155_378_975_999_999_999;

pub fn ticks(dt: &DateTime<Utc>) -> i64 {
    UNIX_EPOCH_TICKS + dt.timestamp() * 10_000_000 + i64::from(dt.timestamp_subsec_nanos() / 100)
}

/// A 19-digit key that sorts newer times first.
pub fn inversed_time_key(dt: &DateTime<Utc>) -> String {
    format!("{:019}", MAX_TICKS - ticks(dt) + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn epoch_key() {
        let epoch = Utc.timestamp_opt(0, 0).unwrap();
        assert_eq!(ticks(&epoch), UNIX_EPOCH_TICKS);
        assert_eq!(inversed_time_key(&epoch), "2534023008000000000");
    }

    #[test]
    fn newer_sorts_first() {
        let now = Utc::now();
        let later = now + Duration::seconds(1);
        let a = inversed_time_key(&now);
        let b = inversed_time_key(&later);
        assert_eq!(a.len(), 19);
        assert!(b < a);
    }
}
