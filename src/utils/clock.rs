use chrono::{DateTime, Local, NaiveDateTime, Utc};

/// Represents an entity responsible for providing dates across application. Word deltas are
/// bucketed by local wall-clock time while debounce bookkeeping uses UTC, so both are exposed.
pub trait Clock: Sync + Send + 'static {
    fn time(&self) -> DateTime<Utc>;

    /// Local wall-clock time used for picking the day and the time bucket.
    fn local_time(&self) -> NaiveDateTime;
}

pub struct DefaultClock;

impl Clock for DefaultClock {
    fn time(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn local_time(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

#[cfg(test)]
pub use manual::ManualClock;

#[cfg(test)]
mod manual {
    use std::sync::{Arc, Mutex};

    use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};

    use super::Clock;

    /// Clock that only moves when told to. Local time is treated as UTC.
    #[derive(Clone)]
    pub struct ManualClock {
        now: Arc<Mutex<NaiveDateTime>>,
    }

    impl ManualClock {
        pub fn new(start: NaiveDateTime) -> Self {
            Self {
                now: Arc::new(Mutex::new(start)),
            }
        }

        pub fn advance(&self, duration: Duration) {
            *self.now.lock().unwrap() += duration;
        }
    }

    impl Clock for ManualClock {
        fn time(&self) -> DateTime<Utc> {
            Utc.from_utc_datetime(&self.local_time())
        }

        fn local_time(&self) -> NaiveDateTime {
            *self.now.lock().unwrap()
        }
    }
}
