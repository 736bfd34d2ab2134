//! Bucket store: net word change per (day, time bucket).

use std::collections::{btree_map::Entry, BTreeMap};

use anyhow::{anyhow, Error};
use chrono::{NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::utils::time::twelve_hour_label;

/// Width of a single time bucket.
pub const BUCKET_MINUTES: u32 = 30;

pub const BUCKETS_PER_DAY: usize = (24 * 60 / BUCKET_MINUTES) as usize;

/// A fixed subdivision of a day, identified by its index from midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeBucket(usize);

impl TimeBucket {
    pub fn new_opt(index: usize) -> Option<Self> {
        (index < BUCKETS_PER_DAY).then_some(Self(index))
    }

    /// Bucket containing the given wall-clock time.
    pub fn from_time(time: NaiveTime) -> Self {
        let minutes = time.hour() * 60 + time.minute();
        Self((minutes / BUCKET_MINUTES) as usize)
    }

    pub fn index(&self) -> usize {
        self.0
    }

    pub fn start(&self) -> NaiveTime {
        let minutes = self.0 as u32 * BUCKET_MINUTES;
        NaiveTime::from_hms_opt(minutes / 60, minutes % 60, 0)
            .expect("bucket index is always within a day")
    }

    /// `HH:MM` key of the bucket start. Used for storage exports and tables.
    pub fn label(&self) -> String {
        self.start().format("%H:%M").to_string()
    }

    /// Spoken form of the bucket start, for example `9am` or `2:30pm`.
    pub fn clock_label(&self) -> String {
        twelve_hour_label(self.start())
    }

    pub fn all() -> impl Iterator<Item = TimeBucket> {
        (0..BUCKETS_PER_DAY).map(TimeBucket)
    }
}

/// Net word change for every bucket of a single day. Values can be negative when more was
/// deleted than written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<i64>", into = "Vec<i64>")]
pub struct DayBuckets(Vec<i64>);

impl Default for DayBuckets {
    fn default() -> Self {
        Self(vec![0; BUCKETS_PER_DAY])
    }
}

impl TryFrom<Vec<i64>> for DayBuckets {
    type Error = Error;

    fn try_from(value: Vec<i64>) -> Result<Self, Self::Error> {
        if value.len() != BUCKETS_PER_DAY {
            return Err(anyhow!(
                "expected {BUCKETS_PER_DAY} buckets per day, found {}",
                value.len()
            ));
        }
        Ok(Self(value))
    }
}

impl From<DayBuckets> for Vec<i64> {
    fn from(value: DayBuckets) -> Self {
        value.0
    }
}

impl DayBuckets {
    pub fn get(&self, bucket: TimeBucket) -> i64 {
        self.0[bucket.index()]
    }

    pub fn add(&mut self, bucket: TimeBucket, delta: i64) {
        let value = &mut self.0[bucket.index()];
        *value = value.saturating_add(delta);
    }

    pub fn values(&self) -> &[i64] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = (TimeBucket, i64)> + '_ {
        TimeBucket::all().zip(self.0.iter().copied())
    }

    pub fn has_activity(&self) -> bool {
        self.0.iter().any(|v| *v != 0)
    }
}

/// Mapping from calendar day to its buckets. Days are only created by [BucketStore::accumulate],
/// reading never creates them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BucketStore {
    days: BTreeMap<NaiveDate, DayBuckets>,
}

impl BucketStore {
    /// Adds `delta` to the bucket. Returns true when this created the day.
    pub fn accumulate(&mut self, date: NaiveDate, bucket: TimeBucket, delta: i64) -> bool {
        match self.days.entry(date) {
            Entry::Occupied(mut day) => {
                day.get_mut().add(bucket, delta);
                false
            }
            Entry::Vacant(slot) => {
                slot.insert(DayBuckets::default()).add(bucket, delta);
                true
            }
        }
    }

    /// Buckets for a day, all zero when nothing was recorded.
    pub fn day(&self, date: NaiveDate) -> DayBuckets {
        self.days.get(&date).cloned().unwrap_or_default()
    }

    pub fn contains_day(&self, date: NaiveDate) -> bool {
        self.days.contains_key(&date)
    }

    pub fn has_any_data(&self) -> bool {
        !self.days.is_empty()
    }

    pub fn has_activity_on(&self, date: NaiveDate) -> bool {
        self.days.get(&date).is_some_and(DayBuckets::has_activity)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NaiveDate, &DayBuckets)> {
        self.days.iter()
    }

    pub(crate) fn insert_day(&mut self, date: NaiveDate, buckets: DayBuckets) {
        self.days.insert(date, buckets);
    }

    pub fn clear(&mut self) {
        self.days.clear();
    }
}
