//! Configuration loading.
//!
//! Configuration lives in `~/.dealmap/config.json` (camelCase keys, all
//! fields optional) with the CRM token overridable via the `DEALMAP_CRM_TOKEN`
//! environment variable. A missing token or base id is the single fatal
//! startup condition; every other field has a workable default.

use std::fs;
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::PipelineError;

/// Environment variable that overrides `crmToken` from the config file.
pub const TOKEN_ENV: &str = "DEALMAP_CRM_TOKEN";

fn default_crm_base_url() -> String {
    "https://api.airtable.com/v0".to_string()
}

fn default_cache_file() -> PathBuf {
    state_dir().join("geocode_cache.json")
}

fn default_output_file() -> PathBuf {
    PathBuf::from("data.json")
}

/// `~/.dealmap`, where config and cache live.
pub fn state_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_default().join(".dealmap")
}

/// Path to the config file.
pub fn config_path() -> PathBuf {
    state_dir().join("config.json")
}

/// CRM table names, overridable for bases that renamed them.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrmTables {
    #[serde(default = "default_companies_table")]
    pub companies: String,
    #[serde(default = "default_contacts_table")]
    pub contacts: String,
    #[serde(default = "default_outreach_table")]
    pub outreach: String,
}

fn default_companies_table() -> String {
    "Companies".to_string()
}

fn default_contacts_table() -> String {
    "Contacts".to_string()
}

fn default_outreach_table() -> String {
    "Cold Outreach".to_string()
}

impl Default for CrmTables {
    fn default() -> Self {
        Self {
            companies: default_companies_table(),
            contacts: default_contacts_table(),
            outreach: default_outreach_table(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// CRM personal access token. Required; see [`TOKEN_ENV`].
    #[serde(default)]
    pub crm_token: String,
    #[serde(default = "default_crm_base_url")]
    pub crm_base_url: String,
    /// CRM base (workspace) identifier. Required.
    #[serde(default)]
    pub crm_base: String,
    #[serde(default)]
    pub tables: CrmTables,

    /// Flat CSV company exports (secondary sources). Optional.
    #[serde(default)]
    pub directory_csv: Option<PathBuf>,
    #[serde(default)]
    pub working_sheet_csv: Option<PathBuf>,

    /// Spreadsheet CSV export URLs for the deal pipeline and action tracker.
    /// A local file path may be configured instead for offline runs.
    #[serde(default)]
    pub pipeline_export_url: Option<String>,
    #[serde(default)]
    pub actions_export_url: Option<String>,
    #[serde(default)]
    pub pipeline_csv: Option<PathBuf>,
    #[serde(default)]
    pub actions_csv: Option<PathBuf>,

    #[serde(default = "default_cache_file")]
    pub cache_file: PathBuf,
    #[serde(default = "default_output_file")]
    pub output_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            crm_token: String::new(),
            crm_base_url: default_crm_base_url(),
            crm_base: String::new(),
            tables: CrmTables::default(),
            directory_csv: None,
            working_sheet_csv: None,
            pipeline_export_url: None,
            actions_export_url: None,
            pipeline_csv: None,
            actions_csv: None,
            cache_file: default_cache_file(),
            output_file: default_output_file(),
        }
    }
}

/// Load configuration from `~/.dealmap/config.json`, then apply env overrides.
///
/// A missing config file is fine (defaults apply); a missing CRM token or
/// base id is fatal and must be reported before any fetch is attempted.
pub fn load_config() -> Result<Config, PipelineError> {
    let path = config_path();
    let mut config: Config = if path.exists() {
        let content = fs::read_to_string(&path)?;
        serde_json::from_str(&content)
            .map_err(|e| PipelineError::Config(format!("{}: {}", path.display(), e)))?
    } else {
        Config::default()
    };

    if let Ok(token) = std::env::var(TOKEN_ENV) {
        if !token.is_empty() {
            config.crm_token = token;
        }
    }

    if config.crm_token.is_empty() {
        return Err(PipelineError::ConfigurationMissing(format!(
            "CRM token (set {} or \"crmToken\" in {})",
            TOKEN_ENV,
            path.display()
        )));
    }
    if config.crm_base.is_empty() {
        return Err(PipelineError::ConfigurationMissing(format!(
            "CRM base id (set \"crmBase\" in {})",
            path.display()
        )));
    }

    Ok(config)
}
