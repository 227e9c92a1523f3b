//! Candle history for one (symbol, granularity) and its time-bounded cursor.
//!
//! A [`Timeframe`] is built once and never mutated. Each tick asks it for a
//! [`TimeContext`], which borrows only the rows at or before the simulated
//! time, so nothing after "now" is reachable from strategy code.

use chrono::{DateTime, Utc};
use std::cell::OnceCell;
use std::fmt;

use super::error::SimError;
use super::granularity::Granularity;
use super::row::Row;

#[derive(Debug, Clone)]
pub struct Timeframe {
    symbol: String,
    granularity: Granularity,
    rows: Vec<Row>,
}

impl Timeframe {
    /// Sorts `rows` by time. On duplicate timestamps the last row supplied wins.
    pub fn new(symbol: impl Into<String>, granularity: Granularity, mut rows: Vec<Row>) -> Self {
        rows.sort_by_key(|r| r.time);
        rows.reverse();
        rows.dedup_by_key(|r| r.time);
        rows.reverse();
        Timeframe {
            symbol: symbol.into(),
            granularity,
            rows,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.rows.first().map(|r| r.time)
    }

    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.rows.last().map(|r| r.time)
    }

    pub fn get_context(&self, time: DateTime<Utc>) -> TimeContext<'_> {
        let visible = self.rows.partition_point(|r| r.time <= time);
        TimeContext {
            symbol: &self.symbol,
            granularity: self.granularity,
            time,
            history: &self.rows[..visible],
            current: OnceCell::new(),
            latest: OnceCell::new(),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.start(), self.end()) {
            (Some(start), Some(end)) => write!(f, "{} from {} to {}", self.granularity, start, end),
            _ => write!(f, "{} (empty)", self.granularity),
        }
    }
}

/// Read view of a [`Timeframe`] at one simulated time.
#[derive(Debug)]
pub struct TimeContext<'a> {
    symbol: &'a str,
    granularity: Granularity,
    time: DateTime<Utc>,
    history: &'a [Row],
    current: OnceCell<Row>,
    latest: OnceCell<Row>,
}

impl<'a> TimeContext<'a> {
    pub fn symbol(&self) -> &'a str {
        self.symbol
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    /// All rows at or before the simulated time.
    pub fn history(&self) -> &'a [Row] {
        self.history
    }

    /// The row stamped exactly at the simulated time.
    pub fn current(&self) -> Result<&Row, SimError> {
        if let Some(row) = self.current.get() {
            return Ok(row);
        }
        let row = self
            .history
            .last()
            .filter(|r| r.time == self.time)
            .copied()
            .ok_or_else(|| SimError::NoCurrentCandle {
                symbol: self.symbol.to_string(),
                granularity: self.granularity,
            })?;
        Ok(self.current.get_or_init(|| row))
    }

    /// The most recent row at or before the simulated time, flagged delayed
    /// when it is older than that time.
    pub fn latest(&self) -> Result<&Row, SimError> {
        if let Some(row) = self.latest.get() {
            return Ok(row);
        }
        let row = self
            .history
            .last()
            .map(|r| r.with_delayed(r.time != self.time))
            .ok_or_else(|| SimError::NoData {
                symbol: self.symbol.to_string(),
                granularity: self.granularity,
            })?;
        Ok(self.latest.get_or_init(|| row))
    }

    /// Rows covering the last `n` granularity periods, ending at the simulated time.
    /// A window reaching past the calendar yields the whole history.
    pub fn latest_n(&self, n: u32) -> &'a [Row] {
        let cutoff = self
            .granularity
            .period_length(n)
            .and_then(|length| self.time.checked_sub_signed(length));
        match cutoff {
            Some(cutoff) => {
                let from = self.history.partition_point(|r| r.time < cutoff);
                &self.history[from..]
            }
            None => self.history,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::candle::Candle;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 1, 9, 0, 0).unwrap()
    }

    fn row(minute: i64, close: f64) -> Row {
        let c = Candle::new(close, close, close + 0.001, close - 0.001);
        Row {
            time: t0() + Duration::minutes(minute),
            volume: 10,
            complete: true,
            delayed: false,
            ask: c,
            bid: c,
            mid: c,
        }
    }

    fn sample() -> Timeframe {
        // gap at minute 3
        Timeframe::new(
            "EUR_USD",
            Granularity::M1,
            vec![row(4, 1.4), row(0, 1.0), row(2, 1.2), row(1, 1.1)],
        )
    }

    #[test]
    fn rows_are_sorted_with_bounds() {
        let tf = sample();
        let times: Vec<_> = tf.rows().iter().map(|r| r.time).collect();
        let mut sorted = times.clone();
        sorted.sort();
        assert_eq!(times, sorted);
        assert_eq!(tf.start(), Some(t0()));
        assert_eq!(tf.end(), Some(t0() + Duration::minutes(4)));
        assert_eq!(tf.len(), 4);
    }

    #[test]
    fn duplicate_timestamps_keep_last_supplied() {
        let tf = Timeframe::new("EUR_USD", Granularity::M1, vec![row(0, 1.0), row(0, 2.0)]);
        assert_eq!(tf.len(), 1);
        assert_eq!(tf.rows()[0].mid.close, 2.0);
    }

    #[test]
    fn context_hides_future_rows() {
        let tf = sample();
        let ctx = tf.get_context(t0() + Duration::minutes(2));
        assert_eq!(ctx.history().len(), 3);
        assert!(ctx.history().iter().all(|r| r.time <= ctx.time()));
    }

    #[test]
    fn current_exact_match() {
        let tf = sample();
        let ctx = tf.get_context(t0() + Duration::minutes(1));
        let current = ctx.current().unwrap();
        assert_eq!(current.mid.close, 1.1);
        assert!(!current.delayed);
    }

    #[test]
    fn current_fails_in_gap() {
        let tf = sample();
        let ctx = tf.get_context(t0() + Duration::minutes(3));
        assert!(matches!(
            ctx.current(),
            Err(SimError::NoCurrentCandle { .. })
        ));
        // latest still resolves, flagged delayed
        let latest = ctx.latest().unwrap();
        assert_eq!(latest.time, t0() + Duration::minutes(2));
        assert!(latest.delayed);
    }

    #[test]
    fn latest_fails_only_without_history() {
        let tf = sample();
        let before = tf.get_context(t0() - Duration::minutes(1));
        assert!(matches!(before.latest(), Err(SimError::NoData { .. })));

        let on_time = tf.get_context(t0());
        assert!(!on_time.latest().unwrap().delayed);
    }

    #[test]
    fn latest_n_window() {
        let tf = sample();
        let ctx = tf.get_context(t0() + Duration::minutes(4));
        // cutoff = minute 2, inclusive
        let window = ctx.latest_n(2);
        let minutes: Vec<_> = window.iter().map(|r| (r.time - t0()).num_minutes()).collect();
        assert_eq!(minutes, vec![2, 4]);
    }

    #[test]
    fn latest_n_beyond_calendar_returns_all_history() {
        let tf = Timeframe::new("EUR_USD", Granularity::M, vec![row(0, 1.0), row(1, 1.1)]);
        let ctx = tf.get_context(t0() + Duration::minutes(1));
        assert_eq!(ctx.latest_n(u32::MAX).len(), 2);
        assert_eq!(ctx.latest_n(10_000_000).len(), 2);
    }

    #[test]
    fn empty_timeframe_has_no_bounds() {
        let tf = Timeframe::new("EUR_USD", Granularity::H1, Vec::new());
        assert!(tf.is_empty());
        assert_eq!(tf.start(), None);
        assert_eq!(tf.to_string(), "H1 (empty)");
    }
}
