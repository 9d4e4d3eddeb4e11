use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::{Workbook, Worksheet};

use crate::metrics::{self, Metrics};
use crate::reconcile::{self, ReconciledRecord, RevealPolicy};

pub struct ExportReport {
    pub records: usize,
    pub predicted: usize,
}

/// With `safe_mode` set, matches still locked by the reveal gate are written
/// without their score and outcome.
pub fn export_records(
    path: &Path,
    records: &[ReconciledRecord],
    summary: &Metrics,
    safe_mode: bool,
) -> Result<ExportReport> {
    let rows = record_rows(records, safe_mode);

    let summary_rows = vec![
        vec!["Metric".to_string(), "Value".to_string()],
        vec!["Matches".to_string(), summary.matches.to_string()],
        vec!["Predicted".to_string(), summary.predicted.to_string()],
        vec![
            "Winner accuracy".to_string(),
            metrics::format_percent(summary.win_accuracy),
        ],
        vec![
            "Exact scores".to_string(),
            metrics::format_percent(summary.exact_accuracy),
        ],
        vec![
            "Mean goal error".to_string(),
            metrics::format_error(summary.mean_goal_error),
        ],
    ];

    let mut workbook = Workbook::new();
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Records")?;
        write_rows(sheet, &rows)?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Summary")?;
        write_rows(sheet, &summary_rows)?;
    }

    workbook
        .save(path)
        .with_context(|| format!("failed writing workbook to {}", path.display()))?;

    Ok(ExportReport {
        records: rows.len().saturating_sub(1),
        predicted: summary.predicted,
    })
}

/// Header plus one row per record, as written to the "Records" sheet.
pub fn record_rows(records: &[ReconciledRecord], safe_mode: bool) -> Vec<Vec<String>> {
    let mut rows: Vec<Vec<String>> = vec![
        [
            "match_id",
            "Date",
            "HomeTeam",
            "AwayTeam",
            "FTHG",
            "FTAG",
            "FTR",
            "pred_home_score",
            "pred_away_score",
            "pred_winner",
            "has_prediction",
            "winner_correct",
            "exact_score",
            "total_error",
        ]
        .iter()
        .map(|h| h.to_string())
        .collect(),
    ];
    rows.extend(records.iter().map(|record| {
        let policy = if safe_mode {
            reconcile::gate(record)
        } else {
            RevealPolicy::Revealed
        };
        record_row(record, policy)
    }));
    rows
}

fn record_row(record: &ReconciledRecord, policy: RevealPolicy) -> Vec<String> {
    let result = &record.result;
    let pred = record.prediction.as_ref();
    let (home_goals, away_goals, outcome) = match policy {
        RevealPolicy::Revealed => (
            result.home_goals.to_string(),
            result.away_goals.to_string(),
            result.outcome.trim().to_string(),
        ),
        RevealPolicy::Locked => (String::new(), String::new(), String::new()),
    };
    vec![
        result.match_id.clone(),
        result.date_raw.clone(),
        result.home_team.clone(),
        result.away_team.clone(),
        home_goals,
        away_goals,
        outcome,
        opt_to_string(pred.and_then(|p| p.home_goals)),
        opt_to_string(pred.and_then(|p| p.away_goals)),
        pred.map(|p| p.winner.trim().to_string()).unwrap_or_default(),
        record.has_prediction.to_string(),
        opt_to_string(record.winner_correct),
        opt_to_string(record.exact_score),
        opt_to_string(record.total_error),
    ]
}

fn opt_to_string<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn write_rows(worksheet: &mut Worksheet, rows: &[Vec<String>]) -> Result<()> {
    for (row_idx, row) in rows.iter().enumerate() {
        for (col_idx, value) in row.iter().enumerate() {
            worksheet
                .write_string(row_idx as u32, col_idx as u16, value)
                .with_context(|| format!("write cell ({row_idx},{col_idx})"))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::{MatchResult, derive_record};

    #[test]
    fn unpredicted_rows_export_blank_metrics() {
        let record = derive_record(
            MatchResult {
                match_id: "2".to_string(),
                date_raw: "02/08/2025".to_string(),
                date: None,
                home_team: "C".to_string(),
                away_team: "D".to_string(),
                home_goals: 1,
                away_goals: 0,
                outcome: " H".to_string(),
            },
            None,
        );
        let row = record_row(&record, RevealPolicy::Revealed);
        assert_eq!(row[6], "H");
        assert_eq!(row[10], "false");
        assert!(row[11..].iter().all(|c| c.is_empty()));

        let hidden = record_row(&record, RevealPolicy::Locked);
        assert_eq!(hidden[2], "C");
        assert!(hidden[4..7].iter().all(|c| c.is_empty()));
    }

    #[test]
    fn workbook_is_written() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("typer.xlsx");
        let report = export_records(&path, &[], &Metrics::default(), true).expect("export");
        assert_eq!(report.records, 0);
        assert!(path.exists());
    }
}
