use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackerError};
use crate::table::{
    self, PREDICTIONS_COLUMNS, PREDICTIONS_TABLE, RESULTS_COLUMNS, RESULTS_TABLE, RawTable,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub match_id: String,
    pub date_raw: String,
    pub date: Option<NaiveDate>,
    pub home_team: String,
    pub away_team: String,
    pub home_goals: u32,
    pub away_goals: u32,
    pub outcome: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prediction {
    pub match_id: String,
    pub home_goals: Option<u32>,
    pub away_goals: Option<u32>,
    pub winner: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealPolicy {
    Locked,
    Revealed,
}

/// One result row with its optional prediction. The derived fields are
/// `None` whenever `has_prediction` is false.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciledRecord {
    pub result: MatchResult,
    pub prediction: Option<Prediction>,
    pub has_prediction: bool,
    pub winner_correct: Option<bool>,
    pub exact_score: Option<bool>,
    pub total_error: Option<u32>,
}

impl ReconciledRecord {
    pub fn match_id(&self) -> &str {
        &self.result.match_id
    }

    pub fn predicted_score(&self) -> Option<(u32, Option<u32>)> {
        let pred = self.prediction.as_ref()?;
        Some((pred.home_goals?, pred.away_goals))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    pub records: Vec<ReconciledRecord>,
    /// Prediction ids with no matching result; the join drops them.
    pub orphaned: Vec<String>,
}

pub fn reconcile(results: &RawTable, predictions: &RawTable) -> Result<Reconciliation> {
    let results = parse_results(results)?;
    let predictions = parse_predictions(predictions)?;
    Ok(reconcile_typed(results, predictions))
}

pub fn reconcile_typed(results: Vec<MatchResult>, predictions: Vec<Prediction>) -> Reconciliation {
    let result_ids: HashSet<&str> = results.iter().map(|r| r.match_id.as_str()).collect();
    let orphaned = predictions
        .iter()
        .filter(|p| !result_ids.contains(p.match_id.as_str()))
        .map(|p| p.match_id.clone())
        .collect();

    let mut by_id: HashMap<String, Prediction> = predictions
        .into_iter()
        .map(|p| (p.match_id.clone(), p))
        .collect();

    let records = results
        .into_iter()
        .map(|result| {
            let prediction = by_id.remove(&result.match_id);
            derive_record(result, prediction)
        })
        .collect();

    Reconciliation { records, orphaned }
}

pub fn derive_record(result: MatchResult, prediction: Option<Prediction>) -> ReconciledRecord {
    let has_prediction = prediction
        .as_ref()
        .is_some_and(|p| p.home_goals.is_some());

    let (winner_correct, exact_score, total_error) = match (&prediction, has_prediction) {
        (Some(pred), true) => {
            let winner_correct =
                table::normalize_outcome(&result.outcome) == table::normalize_outcome(&pred.winner);
            let pred_home = pred.home_goals.unwrap_or_default();
            let exact_score =
                pred_home == result.home_goals && pred.away_goals == Some(result.away_goals);
            let total_error = pred
                .away_goals
                .map(|pred_away| {
                    pred_home.abs_diff(result.home_goals) + pred_away.abs_diff(result.away_goals)
                });
            (Some(winner_correct), Some(exact_score), total_error)
        }
        _ => (None, None, None),
    };

    ReconciledRecord {
        result,
        prediction,
        has_prediction,
        winner_correct,
        exact_score,
        total_error,
    }
}

pub fn gate(record: &ReconciledRecord) -> RevealPolicy {
    if record.has_prediction {
        RevealPolicy::Revealed
    } else {
        RevealPolicy::Locked
    }
}

pub fn parse_results(raw: &RawTable) -> Result<Vec<MatchResult>> {
    let [id_col, date_col, home_col, away_col, fthg_col, ftag_col, ftr_col] =
        raw.require_columns(RESULTS_TABLE, &RESULTS_COLUMNS)?;

    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(raw.rows.len());
    for row in 0..raw.rows.len() {
        let line = row + 2;
        let match_id = table::normalize_match_id(raw.cell(row, id_col));
        if match_id.is_empty() {
            return Err(TrackerError::schema(
                RESULTS_TABLE,
                format!("row {line}: empty match_id"),
            ));
        }
        if !seen.insert(match_id.clone()) {
            return Err(TrackerError::schema(
                RESULTS_TABLE,
                format!("row {line}: duplicate match_id {match_id}"),
            ));
        }

        let goals = |col: usize, name: &str| -> Result<u32> {
            match table::parse_goals(raw.cell(row, col)) {
                Ok(Some(goals)) => Ok(goals),
                Ok(None) => Err(TrackerError::schema(
                    RESULTS_TABLE,
                    format!("row {line}: {name} is blank for match {match_id}"),
                )),
                Err(msg) => Err(TrackerError::schema(
                    RESULTS_TABLE,
                    format!("row {line}: {name} {msg}"),
                )),
            }
        };
        let home_goals = goals(fthg_col, table::COL_FTHG)?;
        let away_goals = goals(ftag_col, table::COL_FTAG)?;

        let date_raw = raw.cell(row, date_col).trim().to_string();
        out.push(MatchResult {
            date: table::parse_match_date(&date_raw),
            date_raw,
            home_team: raw.cell(row, home_col).trim().to_string(),
            away_team: raw.cell(row, away_col).trim().to_string(),
            home_goals,
            away_goals,
            outcome: raw.cell(row, ftr_col).to_string(),
            match_id,
        });
    }
    Ok(out)
}

pub fn parse_predictions(raw: &RawTable) -> Result<Vec<Prediction>> {
    let [id_col, home_col, away_col, winner_col] =
        raw.require_columns(PREDICTIONS_TABLE, &PREDICTIONS_COLUMNS)?;

    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(raw.rows.len());
    for row in 0..raw.rows.len() {
        let line = row + 2;
        let match_id = table::normalize_match_id(raw.cell(row, id_col));
        if match_id.is_empty() {
            return Err(TrackerError::schema(
                PREDICTIONS_TABLE,
                format!("row {line}: empty match_id"),
            ));
        }
        if !seen.insert(match_id.clone()) {
            return Err(TrackerError::schema(
                PREDICTIONS_TABLE,
                format!("row {line}: duplicate match_id {match_id}"),
            ));
        }
        let goals = |col: usize, name: &str| {
            table::parse_goals(raw.cell(row, col))
                .map_err(|msg| TrackerError::schema(PREDICTIONS_TABLE, format!("row {line}: {name} {msg}")))
        };
        out.push(Prediction {
            home_goals: goals(home_col, table::COL_PRED_HOME)?,
            away_goals: goals(away_col, table::COL_PRED_AWAY)?,
            winner: raw.cell(row, winner_col).to_string(),
            match_id,
        });
    }
    Ok(out)
}

/// The persisted shape: exactly the four prediction columns, nothing derived.
pub fn predictions_to_table(predictions: &[Prediction]) -> RawTable {
    let opt = |v: Option<u32>| v.map(|g| g.to_string()).unwrap_or_default();
    RawTable::new(
        PREDICTIONS_COLUMNS.iter().map(|c| c.to_string()).collect(),
        predictions
            .iter()
            .map(|p| {
                vec![
                    p.match_id.clone(),
                    opt(p.home_goals),
                    opt(p.away_goals),
                    p.winner.trim().to_string(),
                ]
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: &str, home: u32, away: u32, ftr: &str) -> MatchResult {
        MatchResult {
            match_id: id.to_string(),
            date_raw: "01/08/2025".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 8, 1),
            home_team: "A".to_string(),
            away_team: "B".to_string(),
            home_goals: home,
            away_goals: away,
            outcome: ftr.to_string(),
        }
    }

    fn pick(id: &str, home: Option<u32>, away: Option<u32>, winner: &str) -> Prediction {
        Prediction {
            match_id: id.to_string(),
            home_goals: home,
            away_goals: away,
            winner: winner.to_string(),
        }
    }

    #[test]
    fn blank_home_goals_means_no_prediction() {
        let rec = derive_record(result("1", 2, 1, "H"), Some(pick("1", None, Some(1), "H")));
        assert!(!rec.has_prediction);
        assert_eq!(rec.winner_correct, None);
        assert_eq!(rec.total_error, None);
        assert_eq!(rec.exact_score, None);
        assert_eq!(gate(&rec), RevealPolicy::Locked);
    }

    #[test]
    fn blank_away_goals_leaves_error_undefined() {
        let rec = derive_record(result("1", 2, 1, "H"), Some(pick("1", Some(2), None, "h")));
        assert!(rec.has_prediction);
        assert_eq!(rec.winner_correct, Some(true));
        assert_eq!(rec.exact_score, Some(false));
        assert_eq!(rec.total_error, None);
    }

    #[test]
    fn blank_winner_is_wrong_not_undefined() {
        let rec = derive_record(result("1", 1, 1, "D"), Some(pick("1", Some(1), Some(1), "  ")));
        assert_eq!(rec.winner_correct, Some(false));
        assert_eq!(rec.exact_score, Some(true));
        assert_eq!(rec.total_error, Some(0));
    }

    #[test]
    fn orphaned_predictions_are_reported() {
        let out = reconcile_typed(
            vec![result("1", 0, 0, "D")],
            vec![pick("1", Some(0), Some(0), "D"), pick("9", Some(1), Some(0), "H")],
        );
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.orphaned, vec!["9".to_string()]);
    }

    #[test]
    fn persisted_table_has_only_prediction_columns() {
        let table = predictions_to_table(&[pick("3", Some(1), None, " a ")]);
        assert_eq!(table.headers, PREDICTIONS_COLUMNS.map(String::from).to_vec());
        assert_eq!(table.rows, vec![vec!["3".to_string(), "1".to_string(), String::new(), "a".to_string()]]);
    }
}
