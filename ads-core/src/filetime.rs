//! Conversion between device file times and wall-clock timestamps
//!
//! Device timestamps count 100 ns intervals since 1601-01-01 UTC.

use crate::error::{AdsError, AdsResult};
use chrono::{DateTime, Utc};

/// File time of the Unix epoch
pub const FILETIME_UNIX_EPOCH: i64 = 116_444_736_000_000_000;

const TICKS_PER_SECOND: i64 = 10_000_000;
const NANOS_PER_TICK: i64 = 100;

/// Convert a device file time to a UTC timestamp
pub fn filetime_to_datetime(filetime: u64) -> AdsResult<DateTime<Utc>> {
    let ticks = i64::try_from(filetime)
        .map_err(|_| AdsError::Decode(format!("File time {} out of range", filetime)))?
        - FILETIME_UNIX_EPOCH;
    let secs = ticks.div_euclid(TICKS_PER_SECOND);
    let nanos = (ticks.rem_euclid(TICKS_PER_SECOND) * NANOS_PER_TICK) as u32;
    DateTime::from_timestamp(secs, nanos)
        .ok_or_else(|| AdsError::Decode(format!("File time {} out of range", filetime)))
}

/// Convert a UTC timestamp to a device file time
///
/// Sub-tick precision is truncated.
pub fn datetime_to_filetime(datetime: &DateTime<Utc>) -> AdsResult<u64> {
    let ticks = datetime
        .timestamp()
        .checked_mul(TICKS_PER_SECOND)
        .and_then(|t| t.checked_add(i64::from(datetime.timestamp_subsec_nanos()) / NANOS_PER_TICK))
        .and_then(|t| t.checked_add(FILETIME_UNIX_EPOCH))
        .and_then(|t| u64::try_from(t).ok());
    ticks.ok_or_else(|| {
        AdsError::InvalidData(format!("{} cannot be expressed as a file time", datetime))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_unix_epoch() {
        let dt = filetime_to_datetime(FILETIME_UNIX_EPOCH as u64).unwrap();
        assert_eq!(dt, Utc.timestamp_opt(0, 0).unwrap());
    }

    #[test]
    fn test_known_timestamp() {
        // 2021-01-01T00:00:00.1234567Z
        let filetime = 132_539_328_001_234_567u64;
        let dt = filetime_to_datetime(filetime).unwrap();
        assert_eq!(dt.timestamp(), 1_609_459_200);
        assert_eq!(dt.timestamp_subsec_nanos(), 123_456_700);
        assert_eq!(datetime_to_filetime(&dt).unwrap(), filetime);
    }

    #[test]
    fn test_before_unix_epoch() {
        let dt = filetime_to_datetime(0).unwrap();
        assert_eq!(dt.timestamp(), -11_644_473_600);
        assert_eq!(datetime_to_filetime(&dt).unwrap(), 0);
    }

    #[test]
    fn test_out_of_range() {
        assert!(filetime_to_datetime(u64::MAX).is_err());
    }
}
