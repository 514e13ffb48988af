// src/config.rs

use chrono_tz::Tz;
use serde::Deserialize;
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::pending_extractor::MentionScope;
use crate::week_locator::{LocatorConfig, MatchPolicy};

pub const WEBHOOK_URL_VARS: [&str; 2] = ["WEBHOOK_URL", "SEATALK_WEBHOOK_URL"];
pub const SHEET_ID_VARS: [&str; 2] = ["SHEET_ID", "SPREADSHEET_ID"];
pub const CREDENTIALS_VARS: [&str; 2] = ["GSPREAD_CREDENTIALS", "GOOGLE_SERVICE_ACCOUNT_JSON"];
pub const SETTINGS_PREFIX: &str = "SWALK_";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing environment variable(s): {}", .0.join(", "))]
    MissingEnvVars(Vec<String>),
    #[error("Invalid layout settings: {0}")]
    Settings(#[from] envy::Error),
    #[error("Invalid setting {name}: {message}")]
    Invalid { name: String, message: String },
}

/// Optional `SWALK_*` knobs describing the sheet layout and alert behaviour.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LayoutSettings {
    #[serde(default = "default_sheet_tab")]
    pub sheet_tab: String,
    #[serde(default)]
    pub header_row: usize,
    #[serde(default = "default_data_start_row")]
    pub data_start_row: usize,
    #[serde(default)]
    pub data_end_row: Option<usize>,
    #[serde(default = "default_status_start_column")]
    pub status_start_column: usize,
    #[serde(default = "default_policy")]
    pub policy: String,
    #[serde(default)]
    pub start_date_column: usize,
    #[serde(default = "default_end_date_column")]
    pub end_date_column: usize,
    #[serde(default = "default_label_column")]
    pub label_column: usize,
    #[serde(default)]
    pub year_column: Option<usize>,
    #[serde(default)]
    pub pillar_column: Option<usize>,
    #[serde(default = "default_pillar")]
    pub pillar: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Unset means the layout's own default, see [`LayoutSettings::mention_scope`].
    #[serde(default)]
    pub mention_scope: Option<String>,
    #[serde(default)]
    pub roster_path: Option<PathBuf>,
}

fn default_sheet_tab() -> String {
    "Reporte".to_string()
}
fn default_data_start_row() -> usize {
    3
}
fn default_status_start_column() -> usize {
    9
}
fn default_policy() -> String {
    "direct".to_string()
}
fn default_end_date_column() -> usize {
    1
}
fn default_label_column() -> usize {
    8
}
fn default_pillar() -> String {
    "Safety Walk".to_string()
}
fn default_timezone() -> String {
    "America/Sao_Paulo".to_string()
}

impl LayoutSettings {
    pub fn match_policy(&self) -> Result<MatchPolicy, ConfigError> {
        match self.policy.trim().to_lowercase().as_str() {
            "direct" | "direct_dates" => Ok(MatchPolicy::DirectDates {
                start_column: self.start_date_column,
                end_column: self.end_date_column,
                label_column: self.label_column,
            }),
            "label_year" => Ok(MatchPolicy::LabelWithYear {
                label_column: self.label_column,
                year_column: self
                    .year_column
                    .ok_or_else(|| invalid("SWALK_YEAR_COLUMN", "required by the label_year policy"))?,
            }),
            "pillar" => Ok(MatchPolicy::PillarFiltered {
                label_column: self.label_column,
                pillar_column: self
                    .pillar_column
                    .ok_or_else(|| invalid("SWALK_PILLAR_COLUMN", "required by the pillar policy"))?,
                pillar: self.pillar.clone(),
            }),
            other => Err(invalid(
                "SWALK_POLICY",
                &format!("unknown policy '{}' (expected direct, label_year or pillar)", other),
            )),
        }
    }

    pub fn locator_config(&self) -> Result<LocatorConfig, ConfigError> {
        Ok(LocatorConfig {
            policy: self.match_policy()?,
            data_start_row: self.data_start_row,
            data_end_row: self.data_end_row,
        })
    }

    pub fn timezone(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .trim()
            .parse::<Tz>()
            .map_err(|e| invalid("SWALK_TIMEZONE", &e.to_string()))
    }

    /// Explicit `SWALK_MENTION_SCOPE`, or else the whole roster for the direct-date
    /// layout and the pending leads for the label layouts.
    pub fn mention_scope(&self) -> Result<MentionScope, ConfigError> {
        match self.mention_scope.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(scope) => scope
                .parse::<MentionScope>()
                .map_err(|e| invalid("SWALK_MENTION_SCOPE", &e)),
            None => Ok(match self.match_policy()? {
                MatchPolicy::DirectDates { .. } => MentionScope::FullRoster,
                MatchPolicy::LabelWithYear { .. } | MatchPolicy::PillarFiltered { .. } => MentionScope::Pending,
            }),
        }
    }
}

fn invalid(name: &str, message: &str) -> ConfigError {
    ConfigError::Invalid {
        name: name.to_string(),
        message: message.to_string(),
    }
}

/// Everything a run needs, resolved before any network call.
#[derive(Clone)]
pub struct AppConfig {
    pub webhook_url: String,
    pub spreadsheet_id: String,
    pub credentials: String,
    pub layout: LayoutSettings,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("webhook_url", &format!("<{} chars>", self.webhook_url.len()))
            .field("spreadsheet_id", &self.spreadsheet_id)
            .field("credentials", &format!("<{} chars>", self.credentials.len()))
            .field("layout", &self.layout)
            .finish()
    }
}

/// First non-empty value among `names`, with the name it came from.
fn first_non_empty<'a>(vars: &HashMap<String, String>, names: &[&'a str]) -> Option<(&'a str, String)> {
    names.iter().find_map(|name| {
        vars.get(*name)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
            .map(|value| (*name, value.to_string()))
    })
}

impl AppConfig {
    /// Resolves configuration from an explicit set of variables.
    ///
    /// Reports every mandatory variable as found or missing, then fails if any
    /// is missing.
    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: HashMap<String, String> = vars.into_iter().collect();

        let webhook_url = first_non_empty(&vars, &WEBHOOK_URL_VARS);
        let spreadsheet_id = first_non_empty(&vars, &SHEET_ID_VARS);
        let credentials = first_non_empty(&vars, &CREDENTIALS_VARS);

        let mut missing = Vec::new();
        match &webhook_url {
            Some((name, value)) => info!("{}: found ({} chars)", name, value.len()),
            None => {
                error!("{}: NOT FOUND", WEBHOOK_URL_VARS.join(" / "));
                missing.push(WEBHOOK_URL_VARS[0].to_string());
            }
        }
        match &spreadsheet_id {
            Some((name, value)) => {
                info!("{}: found ({})", name, value);
                if looks_like_sheet_url(value) {
                    warn!("{} looks like a full spreadsheet link; use only the ID part", name);
                }
            }
            None => {
                error!("{}: NOT FOUND", SHEET_ID_VARS.join(" / "));
                missing.push(SHEET_ID_VARS[0].to_string());
            }
        }
        match &credentials {
            Some((name, value)) => info!("{}: found ({} chars)", name, value.len()),
            None => {
                error!("{}: NOT FOUND", CREDENTIALS_VARS.join(" / "));
                missing.push(CREDENTIALS_VARS[0].to_string());
            }
        }

        let (Some((_, webhook_url)), Some((_, spreadsheet_id)), Some((_, credentials))) =
            (webhook_url, spreadsheet_id, credentials)
        else {
            return Err(ConfigError::MissingEnvVars(missing));
        };

        let layout = envy::prefixed(SETTINGS_PREFIX).from_iter::<_, LayoutSettings>(vars)?;
        // Validate derived settings up front so a bad value fails before any I/O.
        layout.locator_config()?;
        layout.timezone()?;
        layout.mention_scope()?;

        Ok(Self {
            webhook_url,
            spreadsheet_id,
            credentials,
            layout,
        })
    }
}

/// Loads variables from `path`, or from `./.env` when no path is given.
/// Variables already set in the process environment are kept.
pub fn load_env_file(path: Option<&Path>) {
    match path {
        Some(path) => {
            if let Err(e) = dotenv::from_path(path) {
                warn!("Could not load {}: {}", path.display(), e);
            }
        }
        None => {
            dotenv::dotenv().ok();
        }
    }
}

/// Keeps the variables whose name and value are both valid UTF-8.
pub fn utf8_vars<I>(vars: I) -> Vec<(String, String)>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    vars.into_iter()
        .filter_map(|(name, value)| match (name.into_string(), value.into_string()) {
            (Ok(name), Ok(value)) => Some((name, value)),
            (name, _) => {
                let name = name.unwrap_or_else(|raw| raw.to_string_lossy().into_owned());
                warn!("Ignoring environment variable {} (not valid UTF-8)", name);
                None
            }
        })
        .collect()
}

pub fn looks_like_sheet_url(spreadsheet_id: &str) -> bool {
    spreadsheet_id.contains("google.com") || spreadsheet_id.starts_with("http")
}
