//! Candle sampling resolutions and epoch-anchored period algebra.

use chrono::{DateTime, Duration, Utc};
use std::fmt;
use std::str::FromStr;

use super::error::FxsimError;

/// Seconds from the Unix epoch to 1900-01-01T00:00:00Z, the anchor of every period grid.
pub const EPOCH_TIMESTAMP: i64 = -2_208_988_800;

/// The fixed anchor for [`Granularity::range_periods`].
pub fn epoch() -> DateTime<Utc> {
    DateTime::from_timestamp(EPOCH_TIMESTAMP, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Sampling resolution, ordered finest to coarsest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Granularity {
    S5,
    S10,
    S15,
    S30,
    M1,
    M2,
    M4,
    M5,
    M10,
    M15,
    M30,
    H1,
    H2,
    H3,
    H4,
    H6,
    H8,
    H12,
    D,
    W,
    M,
}

impl Granularity {
    pub const ALL: [Granularity; 21] = [
        Granularity::S5,
        Granularity::S10,
        Granularity::S15,
        Granularity::S30,
        Granularity::M1,
        Granularity::M2,
        Granularity::M4,
        Granularity::M5,
        Granularity::M10,
        Granularity::M15,
        Granularity::M30,
        Granularity::H1,
        Granularity::H2,
        Granularity::H3,
        Granularity::H4,
        Granularity::H6,
        Granularity::H8,
        Granularity::H12,
        Granularity::D,
        Granularity::W,
        Granularity::M,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Granularity::S5 => "S5",
            Granularity::S10 => "S10",
            Granularity::S15 => "S15",
            Granularity::S30 => "S30",
            Granularity::M1 => "M1",
            Granularity::M2 => "M2",
            Granularity::M4 => "M4",
            Granularity::M5 => "M5",
            Granularity::M10 => "M10",
            Granularity::M15 => "M15",
            Granularity::M30 => "M30",
            Granularity::H1 => "H1",
            Granularity::H2 => "H2",
            Granularity::H3 => "H3",
            Granularity::H4 => "H4",
            Granularity::H6 => "H6",
            Granularity::H8 => "H8",
            Granularity::H12 => "H12",
            Granularity::D => "D",
            Granularity::W => "W",
            Granularity::M => "M",
        }
    }

    /// Length of one candle in seconds. A month is a flat 30 days.
    pub fn seconds(&self) -> i64 {
        const MINUTE: i64 = 60;
        const HOUR: i64 = 60 * MINUTE;
        const DAY: i64 = 24 * HOUR;
        match self {
            Granularity::S5 => 5,
            Granularity::S10 => 10,
            Granularity::S15 => 15,
            Granularity::S30 => 30,
            Granularity::M1 => MINUTE,
            Granularity::M2 => 2 * MINUTE,
            Granularity::M4 => 4 * MINUTE,
            Granularity::M5 => 5 * MINUTE,
            Granularity::M10 => 10 * MINUTE,
            Granularity::M15 => 15 * MINUTE,
            Granularity::M30 => 30 * MINUTE,
            Granularity::H1 => HOUR,
            Granularity::H2 => 2 * HOUR,
            Granularity::H3 => 3 * HOUR,
            Granularity::H4 => 4 * HOUR,
            Granularity::H6 => 6 * HOUR,
            Granularity::H8 => 8 * HOUR,
            Granularity::H12 => 12 * HOUR,
            Granularity::D => DAY,
            Granularity::W => 7 * DAY,
            Granularity::M => 30 * DAY,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::seconds(self.seconds())
    }

    /// Length of `period_size` candles, or `None` past the representable range.
    pub fn period_length(&self, period_size: u32) -> Option<Duration> {
        self.seconds()
            .checked_mul(i64::from(period_size))
            .and_then(Duration::try_seconds)
    }

    /// Periods of `period_size` candles covering `[start, end)`.
    ///
    /// The grid is anchored to [`epoch`], not to `start`, so two queries
    /// over overlapping windows always agree on period boundaries.
    pub fn range_periods(
        &self,
        period_size: u32,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<RangePeriods, FxsimError> {
        if period_size == 0 {
            return Err(FxsimError::InvalidPeriodSize);
        }
        if start < epoch() {
            return Err(FxsimError::PeriodBeforeEpoch { start });
        }
        if end < start {
            return Err(FxsimError::PeriodRangeInverted { start, end });
        }

        let length = self.seconds() * i64::from(period_size);
        let elapsed = start.timestamp() - EPOCH_TIMESTAMP;
        let first = EPOCH_TIMESTAMP + (elapsed / length) * length;

        Ok(RangePeriods {
            next_start: first,
            length,
            end,
        })
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Granularity {
    type Err = FxsimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim();
        Granularity::ALL
            .iter()
            .copied()
            .find(|g| g.code() == code)
            .ok_or_else(|| FxsimError::UnknownGranularity {
                code: code.to_string(),
            })
    }
}

/// Lazy iterator returned by [`Granularity::range_periods`].
#[derive(Debug, Clone)]
pub struct RangePeriods {
    next_start: i64,
    length: i64,
    end: DateTime<Utc>,
}

impl Iterator for RangePeriods {
    type Item = (DateTime<Utc>, DateTime<Utc>);

    fn next(&mut self) -> Option<Self::Item> {
        let period_start = DateTime::from_timestamp(self.next_start, 0)?;
        if period_start >= self.end {
            return None;
        }
        let period_end = DateTime::from_timestamp(self.next_start + self.length, 0)?;
        self.next_start += self.length;
        Some((period_start, period_end))
    }
}
