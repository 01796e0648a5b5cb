//! Calendar-day windows in the chain's local time.

use chrono::{DateTime, Days, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};

use bloomledger_core::{DomainError, DomainResult};

/// Parse a `YYYY-MM-DD` date string.
pub fn parse_date(raw: &str) -> DomainResult<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|e| DomainError::validation(format!("invalid date '{raw}': {e}")))
}

/// One business day: `[date 00:00, next date 00:00)` at a fixed UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusinessDay {
    date: NaiveDate,
    offset: FixedOffset,
}

impl BusinessDay {
    pub fn new(date: NaiveDate, offset: FixedOffset) -> Self {
        Self { date, offset }
    }

    pub fn parse(raw: &str, offset: FixedOffset) -> DomainResult<Self> {
        Ok(Self::new(parse_date(raw)?, offset))
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// `YYYY-MM-DD`, the key of the day's aggregate record.
    pub fn key(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }

    /// Start of the day (inclusive), in UTC.
    pub fn start(&self) -> DateTime<Utc> {
        self.local_midnight(self.date)
    }

    /// Start of the following day (exclusive end of this window), in UTC.
    pub fn end(&self) -> DateTime<Utc> {
        match self.date.checked_add_days(Days::new(1)) {
            Some(next) => self.local_midnight(next),
            None => DateTime::<Utc>::MAX_UTC,
        }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start() && instant < self.end()
    }

    pub fn next(&self) -> Option<Self> {
        self.date
            .checked_add_days(Days::new(1))
            .map(|date| Self::new(date, self.offset))
    }

    fn local_midnight(&self, date: NaiveDate) -> DateTime<Utc> {
        // A fixed offset has no gaps or folds, so the mapping is always single.
        let naive = date.and_time(NaiveTime::MIN);
        self.offset
            .from_local_datetime(&naive)
            .single()
            .map(|local| local.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
    }
}
