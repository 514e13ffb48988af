// src/pending_extractor.rs

use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::week_locator::WeekDescriptor;

/// Status a lead's cell carries when the walk was not done that week.
pub const NOT_DONE_STATUS: &str = "NÃO REALIZADO";
pub const PENDING_BULLET: &str = "❌";

#[derive(Error, Debug)]
pub enum RosterError {
    #[error("Failed to open roster file '{path}': {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid roster CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// Key used to match a sheet header against the roster.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_uppercase()
}

#[derive(Debug, Deserialize)]
struct RosterRecord {
    name: String,
    #[serde(default)]
    id: String,
}

/// Display name -> messaging platform user ID.
///
/// An empty ID marks a known lead that cannot be mentioned yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    ids: HashMap<String, String>,
    // Normalized names in file order, for a stable full-team mention list.
    order: Vec<String>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an entry. Later entries win for the same normalized name.
    pub fn insert(&mut self, name: &str, id: &str) {
        let key = normalize_name(name);
        if key.is_empty() {
            return;
        }
        if self.ids.insert(key.clone(), id.trim().to_string()).is_none() {
            self.order.push(key);
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Mentionable ID for `name`, if the lead is known and has one.
    pub fn id_for(&self, name: &str) -> Option<&str> {
        self.ids
            .get(&normalize_name(name))
            .map(String::as_str)
            .filter(|id| !id.is_empty())
    }

    /// Every non-empty ID in roster order, without duplicates.
    pub fn all_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for key in &self.order {
            if let Some(id) = self.ids.get(key).filter(|id| !id.is_empty()) {
                if !ids.contains(id) {
                    ids.push(id.clone());
                }
            }
        }
        ids
    }

    /// Reads a `name,id` CSV with a header line.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, RosterError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let mut roster = Roster::new();
        for record in csv_reader.deserialize::<RosterRecord>() {
            let record = record?;
            roster.insert(&record.name, &record.id);
        }
        Ok(roster)
    }

    pub fn from_csv_path(path: &Path) -> Result<Self, RosterError> {
        let file = std::fs::File::open(path).map_err(|source| RosterError::Open {
            path: path.display().to_string(),
            source,
        })?;
        let roster = Self::from_csv_reader(file)?;
        let unmentionable = roster.len() - roster.all_ids().len();
        info!(
            "Loaded roster from {}: {} leads ({} without a mention ID)",
            path.display(),
            roster.len(),
            unmentionable
        );
        Ok(roster)
    }
}

/// Who gets @-mentioned in the alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MentionScope {
    /// Only the leads that are pending this week.
    #[default]
    Pending,
    /// The whole roster.
    FullRoster,
}

impl FromStr for MentionScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(MentionScope::Pending),
            "roster" | "full_roster" | "all" => Ok(MentionScope::FullRoster),
            other => Err(format!("unknown mention scope '{}' (expected 'pending' or 'roster')", other)),
        }
    }
}

/// Pending names and their IDs, in column order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pendencies {
    pub pending: Vec<String>,
    pub notify_ids: Vec<String>,
}

/// Walks the status columns of the active row.
///
/// A column counts only when its header has a name and its status, trimmed and
/// upper-cased, equals [`NOT_DONE_STATUS`]. Every other status, blank included,
/// is treated as compliant.
pub fn extract(active_row: &[String], header_row: &[String], roster: &Roster, start_column: usize) -> Pendencies {
    let mut result = Pendencies::default();
    let end = active_row.len().min(header_row.len());

    for column in start_column..end {
        let name = header_row[column].trim();
        if name.is_empty() {
            continue;
        }
        let status = active_row[column].trim().to_uppercase();
        if status != NOT_DONE_STATUS {
            continue;
        }

        // Bullet carries the trimmed header, not the raw cell text.
        result.pending.push(format!("{} {}", PENDING_BULLET, name));
        match roster.id_for(name) {
            Some(id) => {
                if !result.notify_ids.iter().any(|known| known == id) {
                    result.notify_ids.push(id.to_string());
                }
            }
            None => debug!("No mention ID for pending lead '{}'", name),
        }
    }

    result
}

/// Everything the alert needs about this week's pending leads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendencyReport {
    pub week_label: String,
    pub due_date: NaiveDate,
    pub pending: Vec<String>,
    pub notify_ids: Vec<String>,
}

impl PendencyReport {
    pub fn from_week(week: &WeekDescriptor, header_row: &[String], roster: &Roster, start_column: usize) -> Self {
        let Pendencies { pending, notify_ids } = extract(&week.cells, header_row, roster, start_column);
        if pending.len() > notify_ids.len() {
            warn!(
                "{} pending leads have no mention ID in the roster",
                pending.len() - notify_ids.len()
            );
        }
        Self {
            week_label: week.label.clone(),
            due_date: week.range.end,
            pending,
            notify_ids,
        }
    }

    pub fn count(&self) -> usize {
        self.pending.len()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn due_date_label(&self) -> String {
        self.due_date.format("%d/%m").to_string()
    }

    /// IDs to attach to the alert for the given scope.
    pub fn mentions(&self, roster: &Roster, scope: MentionScope) -> Vec<String> {
        match scope {
            MentionScope::Pending => self.notify_ids.clone(),
            MentionScope::FullRoster => roster.all_ids(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::date_range::DateRange;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    fn roster() -> Roster {
        let mut roster = Roster::new();
        roster.insert("Ana", "1001");
        roster.insert("BIA", "1002");
        roster.insert("Caio", "");
        roster.insert("  dani ", "1004");
        roster
    }

    #[test]
    fn only_not_done_status_is_pending() {
        let header = row(&["x", "ANA", "BIA", "CAIO"]);
        let active = row(&["x", "NÃO REALIZADO", "REALIZADO", ""]);
        let result = extract(&active, &header, &roster(), 1);
        assert_eq!(result.pending, vec!["❌ ANA".to_string()]);
        assert_eq!(result.notify_ids, vec!["1001".to_string()]);
    }

    #[test]
    fn status_match_ignores_case_and_whitespace() {
        let header = row(&["ANA", "BIA", "DANI"]);
        let active = row(&["  não realizado ", "Não Realizado", "NAO REALIZADO"]);
        let result = extract(&active, &header, &roster(), 0);
        assert_eq!(result.pending, vec!["❌ ANA".to_string(), "❌ BIA".to_string()]);
    }

    #[test]
    fn empty_header_columns_are_skipped() {
        let header = row(&["ANA", "", "  ", "BIA"]);
        let active = row(&["", "NÃO REALIZADO", "NÃO REALIZADO", "NÃO REALIZADO"]);
        let result = extract(&active, &header, &roster(), 0);
        assert_eq!(result.pending, vec!["❌ BIA".to_string()]);
    }

    #[test]
    fn bullet_uses_trimmed_header() {
        let header = row(&["  BIA \t"]);
        let active = row(&["NÃO REALIZADO"]);
        let result = extract(&active, &header, &roster(), 0);
        assert_eq!(result.pending, vec!["❌ BIA".to_string()]);
        assert_eq!(result.notify_ids, vec!["1002".to_string()]);
    }

    #[test]
    fn walk_stops_at_the_shorter_row() {
        let header = row(&["ANA", "BIA"]);
        let active = row(&["NÃO REALIZADO", "NÃO REALIZADO", "NÃO REALIZADO"]);
        assert_eq!(extract(&active, &header, &roster(), 0).pending.len(), 2);

        let short_active = row(&["NÃO REALIZADO"]);
        assert_eq!(extract(&short_active, &header, &roster(), 0).pending.len(), 1);
    }

    #[test]
    fn start_column_past_row_end_yields_nothing() {
        let header = row(&["ANA"]);
        let active = row(&["NÃO REALIZADO"]);
        assert_eq!(extract(&active, &header, &roster(), 9), Pendencies::default());
    }

    #[test]
    fn unmapped_or_blank_ids_are_not_notified() {
        let header = row(&["CAIO", "EDU", "DANI"]);
        let active = row(&["NÃO REALIZADO", "NÃO REALIZADO", "NÃO REALIZADO"]);
        let result = extract(&active, &header, &roster(), 0);
        assert_eq!(result.pending.len(), 3);
        assert_eq!(result.notify_ids, vec!["1004".to_string()]);
    }

    #[test]
    fn duplicate_ids_are_notified_once() {
        let mut roster = Roster::new();
        roster.insert("ANA", "1001");
        roster.insert("ANA PAULA", "1001");
        let header = row(&["ANA", "ANA PAULA", "ANA"]);
        let active = row(&["NÃO REALIZADO", "NÃO REALIZADO", "NÃO REALIZADO"]);
        let result = extract(&active, &header, &roster, 0);
        assert_eq!(result.pending.len(), 3);
        assert_eq!(result.notify_ids, vec!["1001".to_string()]);
    }

    #[test]
    fn report_carries_week_and_mentions() {
        let week = WeekDescriptor {
            label: "Sem 01".to_string(),
            range: DateRange::from_date_cells("01/01/2025", "07/01/2025").unwrap(),
            pillar: None,
            row_index: 3,
            cells: row(&["NÃO REALIZADO", "REALIZADO"]),
        };
        let header = row(&["ANA", "BIA"]);
        let report = PendencyReport::from_week(&week, &header, &roster(), 0);
        assert_eq!(report.week_label, "Sem 01");
        assert_eq!(report.due_date_label(), "07/01");
        assert_eq!(report.count(), 1);
        assert!(report.has_pending());
        assert_eq!(report.mentions(&roster(), MentionScope::Pending), vec!["1001".to_string()]);
        assert_eq!(
            report.mentions(&roster(), MentionScope::FullRoster),
            vec!["1001".to_string(), "1002".to_string(), "1004".to_string()]
        );
    }

    #[test]
    fn roster_loads_from_csv() {
        let data = "name,id\nAna Souza, 1001\nBruno,\n  carla , 1003\n";
        let roster = Roster::from_csv_reader(data.as_bytes()).unwrap();
        assert_eq!(roster.len(), 3);
        assert_eq!(roster.id_for("ANA SOUZA"), Some("1001"));
        assert_eq!(roster.id_for("bruno"), None);
        assert_eq!(roster.id_for("Carla"), Some("1003"));
        assert_eq!(roster.all_ids(), vec!["1001".to_string(), "1003".to_string()]);
    }

    #[test]
    fn roster_file_errors_are_reported() {
        let err = Roster::from_csv_path(Path::new("/definitely/not/here.csv")).unwrap_err();
        assert!(matches!(err, RosterError::Open { .. }));
    }

    #[test]
    fn mention_scope_parses_from_settings() {
        assert_eq!("pending".parse::<MentionScope>(), Ok(MentionScope::Pending));
        assert_eq!(" Roster ".parse::<MentionScope>(), Ok(MentionScope::FullRoster));
        assert!("everyone".parse::<MentionScope>().is_err());
    }
}
