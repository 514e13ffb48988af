// src/date_range.rs

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Full dates as they appear in the report sheet, e.g. `06/01/2025`.
pub const SHEET_DATE_FORMAT: &str = "%d/%m/%Y";

// `(28/12 a 03/01)`, `(2/6 - 8/6)`, `( 01/09 até 07/09 )`
static RANGE_LABEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\(\s*(\d{1,2})/(\d{1,2})\s*(?:a|à|até|-)\s*(\d{1,2})/(\d{1,2})\s*\)")
        .expect("range label regex is valid")
});

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DateParseError {
    #[error("empty date cell")]
    Empty,
    #[error("'{0}' is not a dd/mm/yyyy date")]
    InvalidDate(String),
    #[error("no '(dd/mm a dd/mm)' range found in '{0}'")]
    NoRangeInLabel(String),
    #[error("'{0}' is not a four digit year")]
    InvalidYear(String),
    #[error("{day:02}/{month:02}/{year} is not a calendar date")]
    ImpossibleDate { day: u32, month: u32, year: i32 },
    #[error("range ends ({end}) before it starts ({start})")]
    Inverted { start: NaiveDate, end: NaiveDate },
}

/// Inclusive span of days covered by one reporting week.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, DateParseError> {
        if end < start {
            return Err(DateParseError::Inverted { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }

    /// Parses two explicit `dd/mm/yyyy` cells.
    pub fn from_date_cells(start: &str, end: &str) -> Result<Self, DateParseError> {
        Self::new(parse_sheet_date(start)?, parse_sheet_date(end)?)
    }

    /// Parses a label such as `Semana 52 (28/12 a 03/01)` anchored on `year`.
    ///
    /// When the end month is numerically lower than the start month the range
    /// crosses New Year and the end date moves to `year + 1`.
    pub fn from_label(label: &str, year: i32) -> Result<Self, DateParseError> {
        let caps = RANGE_LABEL_RE
            .captures(label)
            .ok_or_else(|| DateParseError::NoRangeInLabel(label.trim().to_string()))?;

        // The pattern only admits 1-2 digits, so these parses cannot overflow.
        let field = |i: usize| caps[i].parse::<u32>().unwrap_or(0);
        let (start_day, start_month) = (field(1), field(2));
        let (end_day, end_month) = (field(3), field(4));

        let end_year = if end_month < start_month { year + 1 } else { year };

        let start = calendar_date(year, start_month, start_day)?;
        let end = calendar_date(end_year, end_month, end_day)?;
        Self::new(start, end)
    }

    /// Like [`DateRange::from_label`], reading the anchor year from a separate cell.
    pub fn from_label_and_year_cell(label: &str, year_cell: &str) -> Result<Self, DateParseError> {
        Self::from_label(label, parse_year(year_cell)?)
    }
}

pub fn parse_sheet_date(cell: &str) -> Result<NaiveDate, DateParseError> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return Err(DateParseError::Empty);
    }
    NaiveDate::parse_from_str(trimmed, SHEET_DATE_FORMAT)
        .map_err(|_| DateParseError::InvalidDate(trimmed.to_string()))
}

pub fn parse_year(cell: &str) -> Result<i32, DateParseError> {
    let trimmed = cell.trim();
    if trimmed.len() != 4 || !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return Err(DateParseError::InvalidYear(trimmed.to_string()));
    }
    trimmed
        .parse::<i32>()
        .map_err(|_| DateParseError::InvalidYear(trimmed.to_string()))
}

fn calendar_date(year: i32, month: u32, day: u32) -> Result<NaiveDate, DateParseError> {
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or(DateParseError::ImpossibleDate { day, month, year })
}

/// Calendar year of `day`, the implicit anchor for layouts without a year column.
pub fn anchor_year(day: NaiveDate) -> i32 {
    day.year()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_explicit_date_cells() {
        let range = DateRange::from_date_cells("01/01/2025", " 07/01/2025 ").unwrap();
        assert_eq!(range.start, ymd(2025, 1, 1));
        assert_eq!(range.end, ymd(2025, 1, 7));
        assert!(range.contains(ymd(2025, 1, 1)));
        assert!(range.contains(ymd(2025, 1, 7)));
        assert!(!range.contains(ymd(2025, 1, 8)));
    }

    #[test]
    fn rejects_malformed_date_cells() {
        assert_eq!(DateRange::from_date_cells("", "07/01/2025"), Err(DateParseError::Empty));
        assert!(matches!(
            DateRange::from_date_cells("2025-01-01", "07/01/2025"),
            Err(DateParseError::InvalidDate(_))
        ));
        assert!(matches!(
            DateRange::from_date_cells("31/02/2025", "07/03/2025"),
            Err(DateParseError::InvalidDate(_))
        ));
    }

    #[test]
    fn rejects_inverted_explicit_range() {
        assert!(matches!(
            DateRange::from_date_cells("07/01/2025", "01/01/2025"),
            Err(DateParseError::Inverted { .. })
        ));
    }

    #[test]
    fn label_range_rolls_over_new_year() {
        let range = DateRange::from_label_and_year_cell("Semana 52 (28/12 a 03/01)", "2024").unwrap();
        assert_eq!(range.start, ymd(2024, 12, 28));
        assert_eq!(range.end, ymd(2025, 1, 3));
    }

    #[test]
    fn label_range_within_one_year() {
        let range = DateRange::from_label("Sem 23 (2/6 - 8/6)", 2025).unwrap();
        assert_eq!(range.start, ymd(2025, 6, 2));
        assert_eq!(range.end, ymd(2025, 6, 8));
    }

    #[test]
    fn label_separator_is_tolerant() {
        let range = DateRange::from_label("( 01/09  ATÉ 07/09 )", 2025).unwrap();
        assert_eq!(range.start, ymd(2025, 9, 1));
        assert_eq!(range.end, ymd(2025, 9, 7));
    }

    #[test]
    fn label_without_range_is_unparseable() {
        assert!(matches!(
            DateRange::from_label("Semana 10", 2025),
            Err(DateParseError::NoRangeInLabel(_))
        ));
    }

    #[test]
    fn impossible_label_dates_are_reported() {
        assert_eq!(
            DateRange::from_label("(30/02 a 05/03)", 2025),
            Err(DateParseError::ImpossibleDate { day: 30, month: 2, year: 2025 })
        );
    }

    #[test]
    fn year_cell_must_have_four_digits() {
        assert!(parse_year("2024").is_ok());
        assert!(matches!(parse_year("24"), Err(DateParseError::InvalidYear(_))));
        assert!(matches!(parse_year("20x4"), Err(DateParseError::InvalidYear(_))));
    }
}
