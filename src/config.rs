use std::path::PathBuf;

use chrono::NaiveDate;

use crate::table::parse_match_date;

const DEFAULT_RESULTS_FILE: &str = "results.csv";
const DEFAULT_PREDICTIONS_FILE: &str = "predictions.csv";
const DEFAULT_RESULTS_SHEET: &str = "results";
const DEFAULT_PREDICTIONS_SHEET: &str = "predictions";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetsConfig {
    pub spreadsheet_id: String,
    pub access_token: String,
    pub results_sheet: String,
    pub predictions_sheet: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalConfig {
    pub results_path: PathBuf,
    pub predictions_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    Local(LocalConfig),
    Sheets(SheetsConfig),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub results_file: String,
    pub predictions_file: String,
    pub sheets_id: Option<String>,
    pub sheets_token: Option<String>,
    pub results_sheet: String,
    pub predictions_sheet: String,
    pub safe_mode: bool,
    pub filter_from: Option<NaiveDate>,
    pub filter_to: Option<NaiveDate>,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|val| val.trim().to_string())
                .filter(|val| !val.is_empty())
        };

        Self {
            data_dir: non_empty("TYPER_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
            results_file: non_empty("TYPER_RESULTS_FILE")
                .unwrap_or_else(|| DEFAULT_RESULTS_FILE.to_string()),
            predictions_file: non_empty("TYPER_PREDICTIONS_FILE")
                .unwrap_or_else(|| DEFAULT_PREDICTIONS_FILE.to_string()),
            sheets_id: non_empty("GOOGLE_SHEETS_ID"),
            sheets_token: non_empty("GOOGLE_SHEETS_TOKEN"),
            results_sheet: non_empty("TYPER_RESULTS_SHEET")
                .unwrap_or_else(|| DEFAULT_RESULTS_SHEET.to_string()),
            predictions_sheet: non_empty("TYPER_PREDICTIONS_SHEET")
                .unwrap_or_else(|| DEFAULT_PREDICTIONS_SHEET.to_string()),
            safe_mode: non_empty("TYPER_SAFE_MODE")
                .map(|val| parse_flag(&val))
                .unwrap_or(false),
            filter_from: non_empty("TYPER_FILTER_FROM").and_then(|val| parse_match_date(&val)),
            filter_to: non_empty("TYPER_FILTER_TO").and_then(|val| parse_match_date(&val)),
        }
    }

    /// Remote mode needs both the spreadsheet id and a token; anything less
    /// falls back to the local files.
    pub fn backend(&self) -> BackendConfig {
        match (&self.sheets_id, &self.sheets_token) {
            (Some(id), Some(token)) => BackendConfig::Sheets(SheetsConfig {
                spreadsheet_id: id.clone(),
                access_token: token.clone(),
                results_sheet: self.results_sheet.clone(),
                predictions_sheet: self.predictions_sheet.clone(),
            }),
            _ => BackendConfig::Local(LocalConfig {
                results_path: self.data_dir.join(&self.results_file),
                predictions_path: self.data_dir.join(&self.predictions_file),
            }),
        }
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn empty_environment_selects_local_files() {
        let config = config_from(&[]);
        assert_eq!(
            config.backend(),
            BackendConfig::Local(LocalConfig {
                results_path: PathBuf::from("./results.csv"),
                predictions_path: PathBuf::from("./predictions.csv"),
            })
        );
        assert!(!config.safe_mode);
    }

    #[test]
    fn sheet_id_without_token_stays_local() {
        let config = config_from(&[("GOOGLE_SHEETS_ID", "abc")]);
        assert!(matches!(config.backend(), BackendConfig::Local(_)));
    }

    #[test]
    fn credentials_select_sheets() {
        let config = config_from(&[
            ("GOOGLE_SHEETS_ID", "abc"),
            ("GOOGLE_SHEETS_TOKEN", "tok"),
            ("TYPER_PREDICTIONS_SHEET", "typy"),
        ]);
        let BackendConfig::Sheets(sheets) = config.backend() else {
            panic!("expected sheets backend");
        };
        assert_eq!(sheets.spreadsheet_id, "abc");
        assert_eq!(sheets.results_sheet, "results");
        assert_eq!(sheets.predictions_sheet, "typy");
    }

    #[test]
    fn blank_values_are_ignored() {
        let config = config_from(&[("GOOGLE_SHEETS_ID", "  "), ("GOOGLE_SHEETS_TOKEN", "tok")]);
        assert!(matches!(config.backend(), BackendConfig::Local(_)));
    }

    #[test]
    fn safe_mode_and_date_bounds_parse() {
        let config = config_from(&[
            ("TYPER_SAFE_MODE", "Yes"),
            ("TYPER_FILTER_FROM", "01/08/2025"),
            ("TYPER_FILTER_TO", "not a date"),
        ]);
        assert!(config.safe_mode);
        assert_eq!(config.filter_from, NaiveDate::from_ymd_opt(2025, 8, 1));
        assert_eq!(config.filter_to, None);
    }
}
