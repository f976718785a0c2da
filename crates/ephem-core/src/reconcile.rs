//! Cache coverage reconciliation.
//!
//! Given the timestamps a request asks for and the cached positions in the
//! request window (both ascending), decide whether the cache alone can answer.
//! The scan keeps a single forward cursor over the cached rows, so a denser
//! cache (minutely rows for an hourly request) is consumed in one pass.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;

use crate::types::Position;

/// Outcome of checking a request grid against cached rows.
#[derive(Clone, Debug, PartialEq)]
pub enum Reconciliation {
    /// Every requested timestamp had an exact match; rows are in request order.
    Complete(Vec<Position>),
    /// At least one requested timestamp is missing from the cache.
    Incomplete {
        /// The first requested timestamp without a cached row.
        missing: DateTime<Utc>,
    },
}

impl Reconciliation {
    /// Returns true if the cache covered the whole request.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self, Self::Complete(_))
    }

    /// Returns the matched rows, or `None` on a miss.
    #[must_use]
    pub fn into_positions(self) -> Option<Vec<Position>> {
        match self {
            Self::Complete(positions) => Some(positions),
            Self::Incomplete { .. } => None,
        }
    }
}

/// Matches each requested timestamp against `cached`, which must be sorted
/// ascending by time.
///
/// Returns [`Reconciliation::Incomplete`] as soon as one timestamp cannot be
/// matched; partial results are never returned.
pub fn reconcile<I>(requested: I, cached: Vec<Position>) -> Reconciliation
where
    I: IntoIterator<Item = DateTime<Utc>>,
{
    let mut cursor = cached.into_iter().peekable();
    let mut matched = Vec::new();

    for time in requested {
        loop {
            let Some(candidate) = cursor.peek() else {
                return Reconciliation::Incomplete { missing: time };
            };
            match candidate.time.cmp(&time) {
                Ordering::Less => {
                    cursor.next();
                }
                Ordering::Equal => {
                    if let Some(position) = cursor.next() {
                        matched.push(position);
                    }
                    break;
                }
                // Sorted input: nothing further along can match `time`.
                Ordering::Greater => return Reconciliation::Incomplete { missing: time },
            }
        }
    }

    Reconciliation::Complete(matched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::generate;
    use crate::interval::Interval;
    use crate::types::{BodyId, Center, OrbitalElements};
    use chrono::{TimeDelta, TimeZone};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()
    }

    fn position_at(time: DateTime<Utc>) -> Position {
        Position::new(
            BodyId::new(399),
            Center::new("500@10").unwrap(),
            time,
            OrbitalElements {
                semimajor_axis: 1.0,
                ..Default::default()
            },
        )
    }

    fn cache_every(step: TimeDelta, count: i32) -> Vec<Position> {
        (0..count).map(|i| position_at(start() + step * i)).collect()
    }

    #[test]
    fn test_exact_cache_is_complete() {
        let cached = cache_every(TimeDelta::days(1), 3);
        let grid = generate(start(), start() + TimeDelta::days(2), Interval::Day, 1);
        let positions = reconcile(grid, cached.clone()).into_positions().unwrap();
        assert_eq!(positions, cached);
    }

    #[test]
    fn test_minutely_cache_satisfies_hourly_grid() {
        let cached = cache_every(TimeDelta::minutes(1), 3 * 60 + 1);
        let grid = generate(start(), start() + TimeDelta::hours(3), Interval::Hour, 1);
        let positions = reconcile(grid, cached).into_positions().unwrap();
        assert_eq!(positions.len(), 4);
        for (i, position) in positions.iter().enumerate() {
            assert_eq!(position.time, start() + TimeDelta::hours(i as i64));
        }
    }

    #[test]
    fn test_single_gap_is_a_miss() {
        let mut cached = cache_every(TimeDelta::hours(1), 5);
        let removed = cached.remove(2);
        let grid = generate(start(), start() + TimeDelta::hours(4), Interval::Hour, 1);
        assert_eq!(
            reconcile(grid, cached),
            Reconciliation::Incomplete {
                missing: removed.time
            }
        );
    }

    #[test]
    fn test_missing_tail_is_a_miss() {
        let cached = cache_every(TimeDelta::hours(1), 4);
        let grid = generate(start(), start() + TimeDelta::hours(4), Interval::Hour, 1);
        assert!(!reconcile(grid, cached).is_complete());
    }

    #[test]
    fn test_empty_cache_and_empty_grid() {
        let grid = generate(start(), start(), Interval::Day, 1);
        assert!(!reconcile(grid, Vec::new()).is_complete());

        let empty = generate(start(), start() - TimeDelta::days(1), Interval::Day, 1);
        assert_eq!(
            reconcile(empty, cache_every(TimeDelta::days(1), 2)),
            Reconciliation::Complete(Vec::new())
        );
    }

    #[test]
    fn test_off_grid_rows_are_skipped() {
        // Rows at :30 never match an hourly grid, but do not block later matches.
        let mut cached = Vec::new();
        for h in 0..3 {
            cached.push(position_at(start() + TimeDelta::hours(h)));
            cached.push(position_at(
                start() + TimeDelta::hours(h) + TimeDelta::minutes(30),
            ));
        }
        let grid = generate(start(), start() + TimeDelta::hours(2), Interval::Hour, 1);
        let positions = reconcile(grid, cached).into_positions().unwrap();
        assert_eq!(positions.len(), 3);
        assert!(positions.iter().all(|p| p.time.format("%M").to_string() == "00"));
    }
}
