use std::time::Duration;

use anyhow::{Context, anyhow};
use once_cell::sync::OnceCell;
use reqwest::StatusCode;
use reqwest::Url;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::config::SheetsConfig;
use crate::error::{Result, TrackerError, UnavailableReason};
use crate::reconcile::{Prediction, predictions_to_table};
use crate::source::{DataSource, LoadedTables};
use crate::table::{PREDICTIONS_TABLE, RESULTS_TABLE, RawTable};

const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets/";
const REQUEST_TIMEOUT_SECS: u64 = 10;
const CONNECT_TIMEOUT_SECS: u64 = 5;

static CLIENT: OnceCell<Client> = OnceCell::new();

fn sheets_client() -> anyhow::Result<&'static Client> {
    CLIENT.get_or_try_init(|| {
        Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .user_agent(concat!("typer_terminal/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build sheets http client")
    })
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Debug, Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    sheet_id: i64,
    title: String,
}

/// Google Sheets backend: one worksheet per table, first row is the header.
pub struct SheetsSource {
    config: SheetsConfig,
}

impl SheetsSource {
    pub fn new(config: SheetsConfig) -> Self {
        Self { config }
    }

    fn url(&self, segments: &[&str]) -> anyhow::Result<Url> {
        let mut url = Url::parse(SHEETS_API).context("parse sheets api url")?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("sheets api url cannot take path segments"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn fetch_table(&self, table: &str, sheet: &str) -> Result<RawTable> {
        let unavailable =
            |reason, detail: String| TrackerError::unavailable(table, reason, detail);

        let url = self
            .url(&[self.config.spreadsheet_id.as_str(), "values", sheet])
            .map_err(|err| unavailable(UnavailableReason::Unreachable, format!("{err:#}")))?;
        let client = sheets_client()
            .map_err(|err| unavailable(UnavailableReason::Unreachable, format!("{err:#}")))?;

        let resp = client
            .get(url)
            .bearer_auth(&self.config.access_token)
            .query(&[
                ("majorDimension", "ROWS"),
                ("valueRenderOption", "FORMATTED_VALUE"),
            ])
            .send()
            .map_err(|err| {
                unavailable(UnavailableReason::Unreachable, format!("request failed: {err}"))
            })?;
        let status = resp.status();
        let body = resp.text().map_err(|err| {
            unavailable(UnavailableReason::Unreachable, format!("failed reading body: {err}"))
        })?;
        if !status.is_success() {
            return Err(unavailable(
                classify_status(status, &body),
                format!("sheet {sheet:?}: http {status}: {}", error_message(&body)),
            ));
        }
        let grid = parse_value_range(&body)
            .map_err(|err| unavailable(UnavailableReason::Malformed, format!("{err:#}")))?;
        let raw = RawTable::from_grid(grid);
        if raw.headers.is_empty() {
            return Err(unavailable(
                UnavailableReason::Malformed,
                format!("sheet {sheet:?} is empty"),
            ));
        }
        Ok(raw)
    }

    fn predictions_sheet_id(&self) -> anyhow::Result<i64> {
        let url = self.url(&[self.config.spreadsheet_id.as_str()])?;
        let resp = sheets_client()?
            .get(url)
            .bearer_auth(&self.config.access_token)
            .query(&[("fields", "sheets.properties(sheetId,title)")])
            .send()
            .context("request failed")?;
        let status = resp.status();
        let body = resp.text().context("failed reading body")?;
        if !status.is_success() {
            return Err(anyhow!("http {}: {}", status, error_message(&body)));
        }
        let meta: SpreadsheetMeta =
            serde_json::from_str(&body).context("parse spreadsheet metadata")?;
        meta.sheets
            .into_iter()
            .find(|s| s.properties.title == self.config.predictions_sheet)
            .map(|s| s.properties.sheet_id)
            .ok_or_else(|| anyhow!("no sheet named {:?}", self.config.predictions_sheet))
    }

    fn replace_predictions(&self, table: &RawTable) -> anyhow::Result<()> {
        let sheet_id = self.predictions_sheet_id()?;
        let body = build_replace_request(sheet_id, &table.to_grid());
        let target = format!("{}:batchUpdate", self.config.spreadsheet_id);
        let url = self.url(&[target.as_str()])?;
        let resp = sheets_client()?
            .post(url)
            .bearer_auth(&self.config.access_token)
            .json(&body)
            .send()
            .context("request failed")?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(anyhow!("http {}: {}", status, error_message(&body)));
        }
        Ok(())
    }
}

impl DataSource for SheetsSource {
    fn describe(&self) -> String {
        format!(
            "google sheet {} ({} + {})",
            self.config.spreadsheet_id, self.config.results_sheet, self.config.predictions_sheet
        )
    }

    fn load(&self) -> Result<LoadedTables> {
        Ok(LoadedTables {
            results: self.fetch_table(RESULTS_TABLE, &self.config.results_sheet)?,
            predictions: self.fetch_table(PREDICTIONS_TABLE, &self.config.predictions_sheet)?,
        })
    }

    fn save(&self, predictions: &[Prediction]) -> Result<()> {
        let table = predictions_to_table(predictions);
        self.replace_predictions(&table)
            .map_err(|err| TrackerError::persistence(format!("{err:#}")))
    }
}

pub fn parse_value_range(raw: &str) -> anyhow::Result<Vec<Vec<String>>> {
    let range: ValueRange = serde_json::from_str(raw).context("parse value range")?;
    Ok(range
        .values
        .into_iter()
        .map(|row| row.into_iter().map(cell_text).collect())
        .collect())
}

fn cell_text(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Clear-then-write inside one batchUpdate, which the API applies all or
/// nothing.
pub fn build_replace_request(sheet_id: i64, grid: &[Vec<String>]) -> Value {
    let rows: Vec<Value> = grid
        .iter()
        .map(|row| {
            let values: Vec<Value> = row.iter().map(|cell| cell_data(cell)).collect();
            json!({ "values": values })
        })
        .collect();
    json!({
        "requests": [
            {
                "updateCells": {
                    "range": { "sheetId": sheet_id },
                    "fields": "userEnteredValue"
                }
            },
            {
                "updateCells": {
                    "start": { "sheetId": sheet_id, "rowIndex": 0, "columnIndex": 0 },
                    "rows": rows,
                    "fields": "userEnteredValue"
                }
            }
        ]
    })
}

// Only canonical integers become numbers, so the formatted value read back
// is the same text ("007" and "+3" stay strings).
fn cell_data(cell: &str) -> Value {
    if cell.is_empty() {
        return json!({});
    }
    match cell.parse::<i64>() {
        Ok(n) if n.to_string() == cell => json!({ "userEnteredValue": { "numberValue": n } }),
        _ => json!({ "userEnteredValue": { "stringValue": cell } }),
    }
}

pub fn classify_status(status: StatusCode, body: &str) -> UnavailableReason {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => UnavailableReason::PermissionDenied,
        StatusCode::NOT_FOUND => UnavailableReason::Missing,
        // An unknown worksheet name comes back as a 400 range error.
        StatusCode::BAD_REQUEST if body.contains("Unable to parse range") => {
            UnavailableReason::Missing
        }
        _ => UnavailableReason::Unreachable,
    }
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(|m| m.as_str())
                .map(|m| m.to_string())
        })
        .unwrap_or_else(|| body.chars().take(200).collect())
}
