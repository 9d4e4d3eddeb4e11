use std::io::{Read, Write};

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};

use crate::error::TrackerError;

pub const RESULTS_TABLE: &str = "results";
pub const PREDICTIONS_TABLE: &str = "predictions";

pub const COL_MATCH_ID: &str = "match_id";
pub const COL_DATE: &str = "Date";
pub const COL_HOME_TEAM: &str = "HomeTeam";
pub const COL_AWAY_TEAM: &str = "AwayTeam";
pub const COL_FTHG: &str = "FTHG";
pub const COL_FTAG: &str = "FTAG";
pub const COL_FTR: &str = "FTR";
pub const COL_PRED_HOME: &str = "pred_home_score";
pub const COL_PRED_AWAY: &str = "pred_away_score";
pub const COL_PRED_WINNER: &str = "pred_winner";

pub const RESULTS_COLUMNS: [&str; 7] = [
    COL_MATCH_ID,
    COL_DATE,
    COL_HOME_TEAM,
    COL_AWAY_TEAM,
    COL_FTHG,
    COL_FTAG,
    COL_FTR,
];

pub const PREDICTIONS_COLUMNS: [&str; 4] =
    [COL_MATCH_ID, COL_PRED_HOME, COL_PRED_AWAY, COL_PRED_WINNER];

/// Untyped rows as they come out of a CSV file or a sheet range. Rows may be
/// shorter than the header; missing cells read as blank.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let headers = headers.into_iter().map(|h| h.trim().to_string()).collect();
        Self { headers, rows }
    }

    /// First row is the header. A completely empty grid is an empty table.
    pub fn from_grid(mut grid: Vec<Vec<String>>) -> Self {
        if grid.is_empty() {
            return Self::default();
        }
        let headers = grid.remove(0);
        let rows = grid
            .into_iter()
            .filter(|row| row.iter().any(|cell| !cell.trim().is_empty()))
            .collect();
        Self::new(headers, rows)
    }

    pub fn from_csv<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_reader(reader);
        let headers = rdr
            .headers()
            .context("read csv header")?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').to_string())
            .collect::<Vec<_>>();
        let mut rows = Vec::new();
        for (idx, record) in rdr.records().enumerate() {
            let record = record.with_context(|| format!("read csv row {}", idx + 1))?;
            if record.iter().all(|cell| cell.trim().is_empty()) {
                continue;
            }
            rows.push(record.iter().map(|cell| cell.to_string()).collect());
        }
        Ok(Self::new(headers, rows))
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(&self.headers).context("write csv header")?;
        for row in &self.rows {
            wtr.write_record(row).context("write csv row")?;
        }
        wtr.flush().context("flush csv")?;
        Ok(())
    }

    pub fn to_grid(&self) -> Vec<Vec<String>> {
        let mut grid = Vec::with_capacity(self.rows.len() + 1);
        grid.push(self.headers.clone());
        grid.extend(self.rows.iter().cloned());
        grid
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn require_columns<const N: usize>(
        &self,
        table: &str,
        names: &[&str; N],
    ) -> Result<[usize; N], TrackerError> {
        let missing: Vec<&str> = names
            .iter()
            .copied()
            .filter(|name| self.column_index(name).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(TrackerError::schema(
                table,
                format!("missing column(s): {}", missing.join(", ")),
            ));
        }
        let mut out = [0usize; N];
        for (slot, name) in out.iter_mut().zip(names.iter()) {
            *slot = self.column_index(name).unwrap_or_default();
        }
        Ok(out)
    }

    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(|c| c.as_str())
            .unwrap_or("")
    }
}

/// `"7"`, `" 7 "` and `"7.0"` are the same id.
pub fn normalize_match_id(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Some(int_part) = trimmed.strip_suffix(".0") {
        if !int_part.is_empty() && int_part.chars().all(|c| c.is_ascii_digit()) {
            return int_part.to_string();
        }
    }
    trimmed.to_string()
}

pub fn normalize_outcome(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Blank cells are `None`. Integral floats are accepted because spreadsheet
/// exports write goal columns with gaps as `2.0`.
pub fn parse_goals(raw: &str) -> std::result::Result<Option<u32>, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    if let Ok(value) = trimmed.parse::<u32>() {
        return Ok(Some(value));
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 && value.fract() == 0.0 => {
            if value > u32::MAX as f64 {
                return Err(format!("goal count out of range: {trimmed}"));
            }
            Ok(Some(value as u32))
        }
        _ => Err(format!("not a goal count: {trimmed:?}")),
    }
}

/// Day-first parsing for ambiguous dates. Four digit year formats refuse
/// years before 1900 so that `01/08/25` falls through to the two digit form.
pub fn parse_match_date(raw: &str) -> Option<NaiveDate> {
    const FULL_YEAR: [&str; 4] = ["%Y-%m-%d", "%d/%m/%Y", "%d.%m.%Y", "%d-%m-%Y"];
    const SHORT_YEAR: [&str; 3] = ["%d/%m/%y", "%d.%m.%y", "%d-%m-%y"];

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    // Datetime strings keep only their date part.
    let date_part = trimmed
        .split_once(|c: char| c == ' ' || c == 'T')
        .map(|(date, _)| date)
        .unwrap_or(trimmed);

    for fmt in FULL_YEAR {
        if let Ok(date) = NaiveDate::parse_from_str(date_part, fmt) {
            if date.year() >= 1900 {
                return Some(date);
            }
        }
    }
    SHORT_YEAR
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
}
