//! Grandfather-father-son retention
//!
//! A [`RetentionPolicy`] produces a [`RetentionSchedule`]: a sorted set of
//! boundaries marking the start of recent days, weeks (Monday) and months.
//! For each boundary the schedule keeps the single earliest candidate at or
//! after it, so each retained snapshot is the first one taken in its window.
//! A candidate may satisfy several boundaries at once.
//!
//! Boundaries are computed in the caller's time zone and stored as UTC.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Datelike, Days, Duration, Months, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::ObjectKey;

/// How many daily, weekly and monthly snapshots to keep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    pub days: u32,
    pub weeks: u32,
    pub months: u32,
}

impl RetentionPolicy {
    pub fn new(days: u32, weeks: u32, months: u32) -> Self {
        Self {
            days,
            weeks,
            months,
        }
    }

    /// Returns true if this policy produces no boundaries at all
    pub fn is_empty(&self) -> bool {
        self.days == 0 && self.weeks == 0 && self.months == 0
    }

    /// Generates the boundary schedule relative to `now`
    ///
    /// Day, week and month starts are taken in `now`'s time zone.
    pub fn schedule<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> RetentionSchedule {
        let tz = now.timezone();
        let today = now.date_naive();
        let mut dates = Vec::new();

        for i in 0..self.days {
            dates.extend(today.checked_sub_days(Days::new(u64::from(i))));
        }

        let monday = today
            .checked_sub_days(Days::new(u64::from(today.weekday().num_days_from_monday())));
        if let Some(monday) = monday {
            for i in 0..self.weeks {
                dates.extend(monday.checked_sub_days(Days::new(7 * u64::from(i))));
            }
        }

        if let Some(first) = today.with_day(1) {
            for i in 0..self.months {
                dates.extend(first.checked_sub_months(Months::new(i)));
            }
        }

        let boundaries: BTreeSet<DateTime<Utc>> = dates
            .into_iter()
            .map(|date| start_of_day(&tz, date))
            .collect();

        RetentionSchedule {
            boundaries: boundaries.into_iter().collect(),
        }
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            days: 30,
            weeks: 5,
            months: 3,
        }
    }
}

/// First instant of `date` in `tz`, as UTC
///
/// Where midnight does not exist (DST gap) the first valid hour after it is used.
fn start_of_day<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    let midnight = date.and_time(chrono::NaiveTime::MIN);
    (0..24)
        .find_map(|hour| {
            tz.from_local_datetime(&(midnight + Duration::hours(hour)))
                .earliest()
        })
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| midnight.and_utc())
}

/// Something retention can choose between: a key and a timestamp
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub key: ObjectKey,
    pub timestamp: DateTime<Utc>,
}

impl Candidate {
    pub fn new(key: ObjectKey, timestamp: DateTime<Utc>) -> Self {
        Self { key, timestamp }
    }
}

/// Sorted, de-duplicated retention boundaries
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RetentionSchedule {
    boundaries: Vec<DateTime<Utc>>,
}

impl RetentionSchedule {
    /// Builds a schedule from explicit boundaries
    pub fn from_boundaries(boundaries: impl IntoIterator<Item = DateTime<Utc>>) -> Self {
        let set: BTreeSet<_> = boundaries.into_iter().collect();
        Self {
            boundaries: set.into_iter().collect(),
        }
    }

    /// Boundaries in ascending order
    pub fn boundaries(&self) -> &[DateTime<Utc>] {
        &self.boundaries
    }

    /// Selects the kept candidate for every boundary
    ///
    /// For boundary B the kept candidate has the smallest timestamp >= B;
    /// equal timestamps are broken by ascending key. Boundaries with no
    /// candidate at or after them keep nothing.
    pub fn select(&self, candidates: &[Candidate]) -> KeptSet {
        let mut sorted: Vec<&Candidate> = candidates.iter().collect();
        sorted.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.key.cmp(&b.key)));

        let mut by_boundary = BTreeMap::new();
        for boundary in &self.boundaries {
            let idx = sorted.partition_point(|c| c.timestamp < *boundary);
            if let Some(kept) = sorted.get(idx) {
                by_boundary.insert(*boundary, kept.key.clone());
            }
        }

        let keys = by_boundary.values().cloned().collect();
        KeptSet { by_boundary, keys }
    }
}

/// The outcome of retention selection
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeptSet {
    by_boundary: BTreeMap<DateTime<Utc>, ObjectKey>,
    keys: BTreeSet<ObjectKey>,
}

impl KeptSet {
    /// Returns true if `key` is kept by at least one boundary
    pub fn contains(&self, key: &ObjectKey) -> bool {
        self.keys.contains(key)
    }

    /// The kept candidate for one boundary, if any
    pub fn kept_for(&self, boundary: &DateTime<Utc>) -> Option<&ObjectKey> {
        self.by_boundary.get(boundary)
    }

    /// Distinct kept keys
    pub fn keys(&self) -> &BTreeSet<ObjectKey> {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
