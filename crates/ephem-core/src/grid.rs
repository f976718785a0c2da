//! Date grid rounding and generation.
//!
//! A request window is first widened to whole interval units with
//! [`round_down`] and [`round_up`]; [`generate`] then walks that window in
//! `skip`-unit strides. Both the remote fetch window and the local cache
//! check use the same aligned bounds.

use chrono::{DateTime, TimeDelta, Timelike, Utc};

use crate::interval::Interval;
use crate::step::StepSpec;

/// Zeroes every time component finer than `interval`.
#[must_use]
pub fn round_down(time: DateTime<Utc>, interval: Interval) -> DateTime<Utc> {
    let (hour, minute) = match interval {
        Interval::Day => (0, 0),
        Interval::Hour => (time.hour(), 0),
        Interval::Minute => (time.hour(), time.minute()),
    };
    time.date_naive()
        .and_hms_opt(hour, minute, 0)
        .map_or(time, |naive| naive.and_utc())
}

/// Rounds up to the next interval boundary, leaving aligned timestamps unchanged.
#[must_use]
pub fn round_up(time: DateTime<Utc>, interval: Interval) -> DateTime<Utc> {
    let down = round_down(time, interval);
    if down == time {
        return time;
    }
    down.checked_add_signed(interval.delta()).unwrap_or(down)
}

/// Walks `[start, stop]` in `interval` units, keeping every `skip`-th tick.
///
/// The number of ticks is the whole-unit difference between `stop` and
/// `start`, truncated, plus one. A `stop` before `start` yields nothing and a
/// `skip` of zero is treated as one.
#[must_use]
pub fn generate(
    start: DateTime<Utc>,
    stop: DateTime<Utc>,
    interval: Interval,
    skip: u32,
) -> DateGrid {
    let span = stop.signed_duration_since(start);
    let count = if span < TimeDelta::zero() {
        0
    } else {
        span.num_seconds() / interval.seconds() + 1
    };

    DateGrid {
        start,
        interval,
        skip: i64::from(skip.max(1)),
        next: 0,
        count,
    }
}

/// Lazy, ascending sequence of grid timestamps.
#[derive(Clone, Debug)]
pub struct DateGrid {
    start: DateTime<Utc>,
    interval: Interval,
    skip: i64,
    next: i64,
    count: i64,
}

impl DateGrid {
    /// Builds the grid for a step over an already aligned window.
    #[must_use]
    pub fn new(start: DateTime<Utc>, stop: DateTime<Utc>, step: StepSpec) -> Self {
        generate(start, stop, step.interval(), step.skip())
    }

    /// Returns the number of interval units the window spans, plus one.
    #[must_use]
    pub const fn interval_count(&self) -> i64 {
        self.count
    }
}

impl Iterator for DateGrid {
    type Item = DateTime<Utc>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.count {
            return None;
        }
        let n = self.next;
        self.next = self.next.saturating_add(self.skip);

        let offset = n
            .checked_mul(self.interval.seconds())
            .and_then(TimeDelta::try_seconds);
        match offset.and_then(|offset| self.start.checked_add_signed(offset)) {
            Some(time) => Some(time),
            None => {
                self.next = self.count;
                None
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.next >= self.count {
            return (0, Some(0));
        }
        let remaining = (self.count - self.next - 1) / self.skip + 1;
        (0, usize::try_from(remaining).ok())
    }
}
