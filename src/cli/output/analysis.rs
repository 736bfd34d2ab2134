//! Pure aggregations over recorded buckets. Nothing here touches storage or the clock, callers
//! pass in the day they consider today.

use chrono::{Days, NaiveDate};

use crate::daemon::storage::buckets::{BucketStore, DayBuckets, TimeBucket, BUCKETS_PER_DAY};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeakBucket {
    pub bucket: TimeBucket,
    pub value: i64,
    /// 12 hour clock label of the bucket start, e.g. `9am` or `2:30pm`.
    pub label: String,
}

/// Buckets of a single day, zero everywhere if nothing was recorded.
pub fn day_vector(store: &BucketStore, date: NaiveDate) -> DayBuckets {
    store.day(date)
}

/// Net words written during the day.
pub fn day_total(buckets: &DayBuckets) -> i64 {
    buckets.values().iter().sum()
}

/// Per bucket average over `window_days` calendar days ending with `today`.
///
/// A bucket only counts for the days where it's non-zero. Zero stands in for "nothing observed",
/// so a session that nets out at exactly zero words doesn't lower the average either.
pub fn rolling_average(store: &BucketStore, today: NaiveDate, window_days: u32) -> DayBuckets {
    let mut sums = [0i64; BUCKETS_PER_DAY];
    let mut counts = [0u32; BUCKETS_PER_DAY];

    let dates = (0..window_days).filter_map(|offset| today.checked_sub_days(Days::new(offset.into())));
    for date in dates {
        for (bucket, value) in store.day(date).iter() {
            if value != 0 {
                sums[bucket.index()] += value;
                counts[bucket.index()] += 1;
            }
        }
    }

    let mut average = DayBuckets::default();
    for bucket in TimeBucket::all() {
        let count = counts[bucket.index()];
        if count > 0 {
            let mean = sums[bucket.index()] as f64 / f64::from(count);
            // f64::round rounds half away from zero.
            average.add(bucket, mean.round() as i64);
        }
    }
    average
}

/// Up to `top_n` buckets with the most words, highest first. Buckets without positive values
/// are never reported, even if that means returning fewer than asked for.
pub fn peak_buckets(buckets: &DayBuckets, top_n: usize) -> Vec<PeakBucket> {
    let mut positive = buckets
        .iter()
        .filter(|(_, value)| *value > 0)
        .collect::<Vec<_>>();
    // Stable, so ties keep the earlier bucket first.
    positive.sort_by(|a, b| b.1.cmp(&a.1));
    positive.truncate(top_n);

    positive
        .into_iter()
        .map(|(bucket, value)| PeakBucket {
            bucket,
            value,
            label: bucket.clock_label(),
        })
        .collect()
}
