use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;

/// One monthly archive's identity: the unit of work ("YYYY-MM").
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: u16,
    pub month: u8, // 1..=12
}

impl YearMonth {
    pub fn new(year: u16, month: u8) -> Self {
        assert!((1..=12).contains(&month), "Month must be 1..=12");
        Self { year, month }
    }

    /// Fallible constructor for values coming from file names or user input.
    pub fn try_new(year: u16, month: u8) -> Option<Self> {
        if (1..=12).contains(&month) { Some(Self { year, month }) } else { None }
    }

    pub fn next(self) -> Option<Self> {
        if self.month < 12 {
            Some(Self { year: self.year, month: self.month + 1 })
        } else if self.year < u16::MAX {
            Some(Self { year: self.year + 1, month: 1 })
        } else {
            None
        }
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (y, m) = s.split_once('-').ok_or("expected YYYY-MM")?;
        let year: u16 = y.parse().map_err(|_| "invalid year")?;
        let month: u8 = m.parse().map_err(|_| "invalid month")?;
        Self::try_new(year, month).ok_or_else(|| "month must be 01..12".into())
    }
}

/// Inclusive iteration from `start` to `end` (if `start` <= `end`), else empty.
pub fn iter_year_months(start: YearMonth, end: YearMonth) -> impl Iterator<Item = YearMonth> {
    let mut curr = if start <= end { Some(start) } else { None };
    std::iter::from_fn(move || {
        let ret = curr?;
        curr = ret.next().filter(|n| *n <= end);
        Some(ret)
    })
}

/// Every month of every year in `start_year..=end_year`.
pub fn months_of_years(start_year: u16, end_year: u16) -> impl Iterator<Item = YearMonth> {
    iter_year_months(YearMonth::new(start_year, 1), YearMonth::new(end_year, 12))
}

/// Calendar year and 1-based day-of-year of a unix timestamp, in UTC.
pub fn year_and_ordinal(ts: i64) -> Option<(i32, u16)> {
    let dt = OffsetDateTime::from_unix_timestamp(ts).ok()?;
    Some((dt.year(), dt.ordinal()))
}
