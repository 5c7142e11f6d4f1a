//! Newtypes and small value types shared across the pipeline: chain/block
//! identifiers, the EVM/P-chain discriminator, and the time-granularity
//! algebra that drives granular metric scheduling.

use std::fmt;

use chrono::{DateTime, Datelike, Duration, Months, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════════════
// CHAIN / BLOCK IDENTIFIERS
// ═══════════════════════════════════════════════════════════════════════════════

/// A chain identifier. `0` is reserved for the primary P-chain network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChainId(pub u32);

impl ChainId {
    /// The reserved identifier for the primary P-chain network.
    pub const PRIMARY_PCHAIN: Self = Self(0);

    /// The raw numeric value.
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ChainId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

/// A block height. Monotone per chain; never negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockNumber(pub u64);

impl BlockNumber {
    /// The genesis block number.
    pub const GENESIS: Self = Self(0);

    /// Create from a raw value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// The raw numeric value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// The next block after this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// This block minus one, saturating at genesis.
    #[must_use]
    pub const fn saturating_prev(self) -> Self {
        Self(self.0.saturating_sub(1))
    }
}

impl fmt::Display for BlockNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for BlockNumber {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// VIRTUAL MACHINE
// ═══════════════════════════════════════════════════════════════════════════════

/// Which raw-data dialect a configured chain speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vm {
    /// Standard EVM JSON-RPC: blocks, transactions, call traces, event logs.
    Evm,
    /// Avalanche-style platform chain: platform transactions, validators, subnets.
    #[serde(rename = "pchain")]
    PChain,
}

impl fmt::Display for Vm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Evm => write!(f, "evm"),
            Self::PChain => write!(f, "pchain"),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// GRANULARITY / PERIOD ALGEBRA
// ═══════════════════════════════════════════════════════════════════════════════

/// Time-bucket size for granular metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// One-hour buckets.
    Hour,
    /// One-day (UTC) buckets.
    Day,
    /// One-week buckets, starting Monday UTC.
    Week,
    /// One-month (calendar) buckets.
    Month,
}

impl Granularity {
    /// All four granularities, the set every granular metric file is
    /// instantiated across.
    pub const ALL: [Self; 4] = [Self::Hour, Self::Day, Self::Week, Self::Month];

    /// The `toStartOf<Granularity>`-style function name substituted into SQL
    /// templates for the `toStartOf{Granularity}` brace token.
    #[must_use]
    pub const fn to_start_of_fn(self) -> &'static str {
        match self {
            Self::Hour => "toStartOfHour",
            Self::Day => "toStartOfDay",
            Self::Week => "toStartOfWeek",
            Self::Month => "toStartOfMonth",
        }
    }

    /// The lowercase name substituted into the `{granularity}` brace token.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
        }
    }

    /// Truncate `ts` down to the start of the period containing it.
    #[must_use]
    pub fn truncate_to(self, ts: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Self::Hour => ts
                .date_naive()
                .and_hms_opt(ts.hour(), 0, 0)
                .map_or(ts, |naive| Utc.from_utc_datetime(&naive)),
            Self::Day => ts
                .date_naive()
                .and_hms_opt(0, 0, 0)
                .map_or(ts, |naive| Utc.from_utc_datetime(&naive)),
            Self::Week => {
                let days_since_monday = i64::from(ts.weekday().num_days_from_monday());
                let day_start = ts
                    .date_naive()
                    .and_hms_opt(0, 0, 0)
                    .map_or(ts, |naive| Utc.from_utc_datetime(&naive));
                day_start - Duration::days(days_since_monday)
            }
            Self::Month => {
                let first_of_month = ts.date_naive().with_day(1).unwrap_or_else(|| ts.date_naive());
                first_of_month
                    .and_hms_opt(0, 0, 0)
                    .map_or(ts, |naive| Utc.from_utc_datetime(&naive))
            }
        }
    }

    /// Given a period start `p`, return the start of the *next* period.
    ///
    /// Safe to call on an unaligned timestamp too — it truncates first, so
    /// `next_period(ts, g)` always returns an aligned boundary strictly
    /// after the period containing `ts`.
    #[must_use]
    pub fn next_period(self, p: DateTime<Utc>) -> DateTime<Utc> {
        let aligned = self.truncate_to(p);
        match self {
            Self::Hour => aligned + Duration::hours(1),
            Self::Day => aligned + Duration::days(1),
            Self::Week => aligned + Duration::weeks(1),
            Self::Month => aligned
                .checked_add_months(Months::new(1))
                .unwrap_or(aligned),
        }
    }

    /// The ordered list of **closed** period starts strictly after
    /// `last_period`, up to the largest period whose successor boundary is
    /// `<= now`.
    ///
    /// Empty if `now < next_period(last_period, g)` (no period has closed
    /// since the watermark yet). This is the half-open `[first, last)`
    /// window from the indexer runner's granular-metric step.
    #[must_use]
    pub fn period_list(self, last_period: DateTime<Utc>, now: DateTime<Utc>) -> Vec<DateTime<Utc>> {
        let mut periods = Vec::new();
        let mut candidate = self.next_period(last_period);
        while self.next_period(candidate) <= now {
            periods.push(candidate);
            candidate = self.next_period(candidate);
        }
        periods
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn chain_id_display() {
        assert_eq!(ChainId(43114).to_string(), "43114");
    }

    #[test]
    fn block_number_next_and_prev() {
        let b = BlockNumber::new(10);
        assert_eq!(b.next().value(), 11);
        assert_eq!(b.saturating_prev().value(), 9);
        assert_eq!(BlockNumber::GENESIS.saturating_prev().value(), 0);
    }

    #[test]
    fn vm_serde_roundtrip() {
        let evm = serde_json::to_string(&Vm::Evm).unwrap();
        assert_eq!(evm, "\"evm\"");
        let pchain = serde_json::to_string(&Vm::PChain).unwrap();
        assert_eq!(pchain, "\"pchain\"");
    }

    #[test]
    fn truncate_to_hour() {
        let ts = dt(2024, 1, 15, 13, 45, 30);
        assert_eq!(Granularity::Hour.truncate_to(ts), dt(2024, 1, 15, 13, 0, 0));
    }

    #[test]
    fn truncate_to_day() {
        let ts = dt(2024, 1, 15, 13, 45, 30);
        assert_eq!(Granularity::Day.truncate_to(ts), dt(2024, 1, 15, 0, 0, 0));
    }

    #[test]
    fn truncate_to_week_starts_monday() {
        // 2024-01-17 is a Wednesday; the week should start Monday 2024-01-15.
        let ts = dt(2024, 1, 17, 9, 0, 0);
        assert_eq!(Granularity::Week.truncate_to(ts), dt(2024, 1, 15, 0, 0, 0));
    }

    #[test]
    fn truncate_to_month() {
        let ts = dt(2024, 1, 17, 9, 0, 0);
        assert_eq!(Granularity::Month.truncate_to(ts), dt(2024, 1, 1, 0, 0, 0));
    }

    #[test]
    fn next_period_advances_one_unit() {
        let p = dt(2024, 1, 1, 0, 0, 0);
        assert_eq!(Granularity::Day.next_period(p), dt(2024, 1, 2, 0, 0, 0));
        assert_eq!(Granularity::Month.next_period(p), dt(2024, 2, 1, 0, 0, 0));
    }

    #[test]
    fn period_list_empty_when_not_yet_closed() {
        let last = dt(2024, 1, 1, 0, 0, 0);
        let now = dt(2024, 1, 1, 12, 0, 0); // day hasn't closed yet
        assert!(Granularity::Day.period_list(last, now).is_empty());
    }

    #[test]
    fn period_list_emits_closed_periods_only() {
        // Scenario 2 from spec.md §8: range spans 2024-01-01T00:00:00Z through
        // 2024-01-03T05:00:00Z at day granularity. Jan 1 and Jan 2 are closed;
        // Jan 3 is not.
        let last = dt(2023, 12, 31, 0, 0, 0);
        let now = dt(2024, 1, 3, 5, 0, 0);
        let periods = Granularity::Day.period_list(last, now);
        assert_eq!(
            periods,
            vec![dt(2024, 1, 1, 0, 0, 0), dt(2024, 1, 2, 0, 0, 0)]
        );
    }

    #[test]
    fn period_list_last_element_satisfies_boundary_law() {
        let last = dt(2023, 12, 1, 0, 0, 0);
        let now = dt(2024, 3, 10, 0, 0, 0);
        let periods = Granularity::Month.period_list(last, now);
        let &pk = periods.last().unwrap();
        assert!(Granularity::Month.next_period(pk) <= now);
        let next_pk = Granularity::Month.next_period(pk);
        let next_next = Granularity::Month.next_period(next_pk);
        assert!(now < next_next);
    }

    #[test]
    fn granularity_sql_tokens() {
        assert_eq!(Granularity::Hour.to_start_of_fn(), "toStartOfHour");
        assert_eq!(Granularity::Week.as_str(), "week");
    }
}
