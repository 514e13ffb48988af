// src/week_locator.rs

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{debug, info};

use crate::date_range::{anchor_year, DateParseError, DateRange, SHEET_DATE_FORMAT};

/// All cell values of one tab, row by row. Rows may be shorter than the header.
pub type SheetGrid = Vec<Vec<String>>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocateError {
    #[error("empty sheet")]
    EmptySheet,
    #[error("no active week found for today's date ({})", .today.format(SHEET_DATE_FORMAT))]
    NoActiveWeek { today: NaiveDate },
}

/// How a data row describes its reporting week.
///
/// Each variant matches one of the sheet layouts the report has gone through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchPolicy {
    /// Explicit `dd/mm/yyyy` start and end cells, week label in its own column.
    DirectDates {
        start_column: usize,
        end_column: usize,
        label_column: usize,
    },
    /// `(dd/mm a dd/mm)` embedded in the label cell, year in another cell.
    LabelWithYear {
        label_column: usize,
        year_column: usize,
    },
    /// Like `LabelWithYear` but the year is today's, and only rows whose
    /// pillar cell mentions `pillar` are considered.
    PillarFiltered {
        label_column: usize,
        pillar_column: usize,
        pillar: String,
    },
}

impl Default for MatchPolicy {
    fn default() -> Self {
        MatchPolicy::DirectDates {
            start_column: 0,
            end_column: 1,
            label_column: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatorConfig {
    pub policy: MatchPolicy,
    /// First operational row; everything above it is header or fixed rows.
    pub data_start_row: usize,
    /// Exclusive upper bound of the scan; `None` scans to the last row.
    pub data_end_row: Option<usize>,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            policy: MatchPolicy::default(),
            data_start_row: 3,
            data_end_row: None,
        }
    }
}

/// The row describing the week that contains "today".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeekDescriptor {
    pub label: String,
    pub range: DateRange,
    pub pillar: Option<String>,
    /// Absolute index of the matched row in the grid.
    pub row_index: usize,
    pub cells: Vec<String>,
}

/// Why a single row was passed over during the scan.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum RowSkip {
    MissingCell(usize),
    OtherPillar,
    BadDates(DateParseError),
}

impl std::fmt::Display for RowSkip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RowSkip::MissingCell(column) => write!(f, "column {} is empty or missing", column + 1),
            RowSkip::OtherPillar => write!(f, "belongs to another pillar"),
            RowSkip::BadDates(e) => write!(f, "unreadable week: {}", e),
        }
    }
}

impl From<DateParseError> for RowSkip {
    fn from(e: DateParseError) -> Self {
        RowSkip::BadDates(e)
    }
}

fn cell(row: &[String], column: usize) -> Option<&str> {
    row.get(column).map(String::as_str)
}

fn required_cell(row: &[String], column: usize) -> Result<&str, RowSkip> {
    match cell(row, column) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(RowSkip::MissingCell(column)),
    }
}

impl MatchPolicy {
    /// Reads the week described by `row`, without checking it against today.
    pub(crate) fn read_week(&self, row: &[String], today: NaiveDate) -> Result<(String, DateRange, Option<String>), RowSkip> {
        match self {
            MatchPolicy::DirectDates {
                start_column,
                end_column,
                label_column,
            } => {
                let start = required_cell(row, *start_column)?;
                let end = required_cell(row, *end_column)?;
                let range = DateRange::from_date_cells(start, end)?;
                let label = cell(row, *label_column).unwrap_or_default().trim().to_string();
                Ok((label, range, None))
            }
            MatchPolicy::LabelWithYear {
                label_column,
                year_column,
            } => {
                let label = required_cell(row, *label_column)?;
                let year = required_cell(row, *year_column)?;
                let range = DateRange::from_label_and_year_cell(label, year)?;
                Ok((label.trim().to_string(), range, None))
            }
            MatchPolicy::PillarFiltered {
                label_column,
                pillar_column,
                pillar,
            } => {
                let pillar_cell = required_cell(row, *pillar_column)?;
                if !pillar_cell.to_lowercase().contains(&pillar.to_lowercase()) {
                    return Err(RowSkip::OtherPillar);
                }
                let label = required_cell(row, *label_column)?;
                let range = DateRange::from_label(label, anchor_year(today))?;
                Ok((label.trim().to_string(), range, Some(pillar_cell.trim().to_string())))
            }
        }
    }
}

/// Finds the first operational row whose week contains `today`.
///
/// Rows that cannot be read under the configured policy are skipped; only an
/// empty grid or the absence of any matching row is reported.
pub fn locate(rows: &[Vec<String>], today: NaiveDate, config: &LocatorConfig) -> Result<WeekDescriptor, LocateError> {
    if rows.is_empty() {
        return Err(LocateError::EmptySheet);
    }

    let end = config.data_end_row.unwrap_or(rows.len()).min(rows.len());
    let start = config.data_start_row.min(end);

    for (row_index, row) in rows.iter().enumerate().take(end).skip(start) {
        match config.policy.read_week(row, today) {
            Ok((label, range, pillar)) => {
                if range.contains(today) {
                    info!(
                        "Active week found on row {}: '{}' ({} - {})",
                        row_index + 1,
                        label,
                        range.start.format(SHEET_DATE_FORMAT),
                        range.end.format(SHEET_DATE_FORMAT)
                    );
                    return Ok(WeekDescriptor {
                        label,
                        range,
                        pillar,
                        row_index,
                        cells: row.clone(),
                    });
                }
            }
            Err(RowSkip::OtherPillar) => {}
            Err(skip) => {
                debug!("Skipping row {}: {}", row_index + 1, skip);
            }
        }
    }

    Err(LocateError::NoActiveWeek { today })
}
