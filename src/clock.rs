// =============================================================================
// Timezone-aware wall clock
// =============================================================================

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use parking_lot::RwLock;

/// A `now()` port anchored in a configured IANA zone. All day-boundary math
/// is done relative to this zone; Ledger-side filters use the UTC instants
/// of those boundaries.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
    fn zone(&self) -> Tz;

    fn today(&self) -> NaiveDate {
        self.now().with_timezone(&self.zone()).date_naive()
    }

    /// `[00:00:00.000, 23:59:59.999]` in the configured zone, as a UTC instant.
    fn start_of_day(&self, date: NaiveDate) -> DateTime<Utc> {
        let local_start = date.and_hms_opt(0, 0, 0).expect("valid midnight");
        self.zone()
            .from_local_datetime(&local_start)
            .single()
            .unwrap_or_else(|| self.zone().from_utc_datetime(&local_start))
            .with_timezone(&Utc)
    }

    fn end_of_day(&self, date: NaiveDate) -> DateTime<Utc> {
        let local_end = date
            .and_hms_milli_opt(23, 59, 59, 999)
            .expect("valid end of day");
        self.zone()
            .from_local_datetime(&local_end)
            .single()
            .unwrap_or_else(|| self.zone().from_utc_datetime(&local_end))
            .with_timezone(&Utc)
    }
}

/// Production clock, pinned to a configured zone (default `Asia/Makassar`).
pub struct SystemClock {
    zone: Tz,
}

impl SystemClock {
    pub fn new(zone: Tz) -> Self {
        Self { zone }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn zone(&self) -> Tz {
        self.zone
    }
}

/// Test clock with an adjustable fixed instant, mirroring the teacher's
/// pattern of swapping live ports for deterministic doubles in tests.
pub struct FixedClock {
    instant: RwLock<DateTime<Utc>>,
    zone: Tz,
}

impl FixedClock {
    pub fn new(instant: DateTime<Utc>, zone: Tz) -> Self {
        Self {
            instant: RwLock::new(instant),
            zone,
        }
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        *self.instant.write() = instant;
    }

    pub fn advance(&self, delta: Duration) {
        let mut guard = self.instant.write();
        *guard = *guard + delta;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.instant.read()
    }

    fn zone(&self) -> Tz {
        self.zone
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn start_and_end_of_day_bracket_the_day() {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2026, 3, 15, 4, 0, 0).unwrap(), chrono_tz::Asia::Makassar);
        let date = NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();
        let start = clock.start_of_day(date);
        let end = clock.end_of_day(date);
        assert!(start < end);
        assert_eq!((end - start).num_seconds(), 86399);
    }

    #[test]
    fn today_uses_configured_zone_not_utc() {
        // 01:00 UTC on the 15th is already the 15th in Makassar (+08:00).
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2026, 3, 15, 1, 0, 0).unwrap(), chrono_tz::Asia::Makassar);
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2026, 3, 15).unwrap());
    }
}
