// src/runner.rs

use chrono::{NaiveDate, Utc};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::{AppConfig, ConfigError};
use crate::credentials::{CredentialsError, ServiceAccountKey};
use crate::notifier::{compose_message, Alert, NotificationError, Notifier, WebhookNotifier};
use crate::pending_extractor::{MentionScope, PendencyReport, Roster, RosterError};
use crate::sheets_client::{SheetSource, SheetsClient, SheetsError};
use crate::week_locator::{locate, LocateError, LocatorConfig};

/// Failures that stop a run before the sheet could be evaluated.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Credential error: {0}")]
    Credentials(#[from] CredentialsError),
    #[error("Roster error: {0}")]
    Roster(#[from] RosterError),
    #[error("Could not read the report sheet: {0}")]
    Sheets(#[from] SheetsError),
    #[error("Webhook setup error: {0}")]
    Notifier(#[from] NotificationError),
}

/// How a run that got as far as the sheet ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Empty sheet or no row covering today; nothing to do.
    NoActiveWeek(LocateError),
    NothingPending { week_label: String },
    Notified { pending: usize, mentioned: usize },
    /// The alert was composed but not sent.
    DryRun { alert: Alert },
    /// Sending failed; reported, not retried.
    DeliveryFailed { pending: usize, reason: String },
}

/// Command-line overrides for a single run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub today: Option<NaiveDate>,
    pub roster_path: Option<PathBuf>,
    pub dry_run: bool,
}

/// The sheet-facing part of the configuration.
#[derive(Debug, Clone)]
pub struct CheckSettings {
    pub spreadsheet_id: String,
    pub sheet_tab: String,
    pub header_row: usize,
    pub status_start_column: usize,
    pub locator: LocatorConfig,
    pub pillar_title: String,
    pub mention_scope: MentionScope,
}

impl CheckSettings {
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            spreadsheet_id: config.spreadsheet_id.clone(),
            sheet_tab: config.layout.sheet_tab.clone(),
            header_row: config.layout.header_row,
            status_start_column: config.layout.status_start_column,
            locator: config.layout.locator_config()?,
            pillar_title: config.layout.pillar.clone(),
            mention_scope: config.layout.mention_scope()?,
        })
    }
}

/// Fetches the grid, finds this week's row and alerts on pending leads.
pub async fn check_and_notify<S, N>(
    source: &S,
    notifier: &N,
    settings: &CheckSettings,
    roster: &Roster,
    today: NaiveDate,
    dry_run: bool,
) -> Result<RunOutcome, RunError>
where
    S: SheetSource + ?Sized + Sync,
    N: Notifier + ?Sized + Sync,
{
    info!("Checking tab '{}' for {}", settings.sheet_tab, today);
    let grid = source.fetch_grid(&settings.spreadsheet_id, &settings.sheet_tab).await?;

    let week = match locate(&grid, today, &settings.locator) {
        Ok(week) => week,
        Err(reason) => {
            info!("{}", reason);
            return Ok(RunOutcome::NoActiveWeek(reason));
        }
    };

    match &week.pillar {
        Some(pillar) => info!("Evaluating row {} ({})", week.row_index + 1, pillar),
        None => info!("Evaluating row {}", week.row_index + 1),
    }

    let header_row = grid.get(settings.header_row).map(Vec::as_slice).unwrap_or_default();
    let report = PendencyReport::from_week(&week, header_row, roster, settings.status_start_column);

    if !report.has_pending() {
        info!("All clear for '{}': nobody pending", report.week_label);
        return Ok(RunOutcome::NothingPending {
            week_label: report.week_label,
        });
    }

    let alert = Alert {
        content: compose_message(&report, &settings.pillar_title),
        mentions: report.mentions(roster, settings.mention_scope),
    };

    if dry_run {
        info!("Dry run, not sending:\n{}", alert.content);
        info!("Would mention {} user(s)", alert.mentions.len());
        return Ok(RunOutcome::DryRun { alert });
    }

    info!(
        "Sending alert for {} pending lead(s), mentioning {} user(s)",
        report.count(),
        alert.mentions.len()
    );
    match notifier.send_notification(&alert).await {
        Ok(()) => Ok(RunOutcome::Notified {
            pending: report.count(),
            mentioned: alert.mentions.len(),
        }),
        Err(e) => {
            error!("Failed to deliver alert: {}", e);
            Ok(RunOutcome::DeliveryFailed {
                pending: report.count(),
                reason: e.to_string(),
            })
        }
    }
}

fn load_roster(path: Option<&PathBuf>) -> Result<Roster, RosterError> {
    match path {
        Some(path) => {
            let roster = Roster::from_csv_path(path)?;
            if roster.is_empty() {
                warn!("Roster {} has no entries; alerts will carry no mentions", path.display());
            }
            Ok(roster)
        }
        None => {
            warn!("No roster configured (SWALK_ROSTER_PATH / --roster); alerts will carry no mentions");
            Ok(Roster::new())
        }
    }
}

/// One full pass from already-resolved configuration.
pub async fn run(config: AppConfig, options: RunOptions) -> Result<RunOutcome, RunError> {
    let settings = CheckSettings::from_config(&config)?;
    let today = match options.today {
        Some(day) => day,
        None => Utc::now().with_timezone(&config.layout.timezone()?).date_naive(),
    };
    let roster = load_roster(options.roster_path.as_ref().or(config.layout.roster_path.as_ref()))?;
    let key = ServiceAccountKey::decode(&config.credentials)?;
    info!("Using service account {}", key.client_email);

    let notifier = WebhookNotifier::new(&config.webhook_url)?;
    let source = SheetsClient::new(key);

    check_and_notify(&source, &notifier, &settings, &roster, today, options.dry_run).await
}

/// Resolves configuration from `vars` and runs; nothing touches the network
/// unless every mandatory variable is present.
pub async fn run_with_vars<I>(vars: I, options: RunOptions) -> Result<RunOutcome, RunError>
where
    I: IntoIterator<Item = (String, String)>,
{
    let config = AppConfig::from_vars(vars)?;
    run(config, options).await
}
