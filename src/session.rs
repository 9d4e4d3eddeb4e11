use std::collections::HashSet;

use crate::config::Config;
use crate::editor::PredictionDraft;
use crate::error::{Result, TrackerError};
use crate::reconcile::{self, Prediction, ReconciledRecord};
use crate::source::{self, DataSource, LoadedTables};

/// Everything derived from one load. Never persisted; rebuilt after each
/// successful save.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub records: Vec<ReconciledRecord>,
    pub predictions: Vec<Prediction>,
    pub orphaned: Vec<String>,
}

impl Snapshot {
    pub fn from_tables(tables: &LoadedTables) -> Result<Self> {
        let results = reconcile::parse_results(&tables.results)?;
        let predictions = reconcile::parse_predictions(&tables.predictions)?;
        let joined = reconcile::reconcile_typed(results, predictions.clone());
        Ok(Self {
            records: joined.records,
            predictions,
            orphaned: joined.orphaned,
        })
    }

    pub fn known_ids(&self) -> HashSet<String> {
        self.records
            .iter()
            .map(|r| r.result.match_id.clone())
            .collect()
    }
}

/// A save that got past validation and was written. The reload that
/// follows can still fail; the write stands either way.
#[derive(Debug)]
pub struct SaveOutcome {
    pub saved: Vec<Prediction>,
    pub reloaded: Result<Snapshot>,
}

pub struct Session {
    source: Box<dyn DataSource>,
}

impl Session {
    pub fn new(source: Box<dyn DataSource>) -> Self {
        Self { source }
    }

    pub fn open(config: &Config) -> Self {
        Self::new(source::open_backend(config))
    }

    pub fn describe(&self) -> String {
        self.source.describe()
    }

    pub fn load(&self) -> Result<Snapshot> {
        let tables = self.source.load()?;
        Snapshot::from_tables(&tables)
    }

    /// validate → persist → reload. `Err` means nothing was written: either
    /// validation failed or the write did. Once the write lands the result
    /// is `Ok`, even when the reload afterwards fails.
    pub fn save(&self, draft: &PredictionDraft, known_ids: &HashSet<String>) -> Result<SaveOutcome> {
        let predictions = draft.validate(known_ids).map_err(TrackerError::Validation)?;
        self.source.save(&predictions)?;
        Ok(SaveOutcome {
            reloaded: self.load(),
            saved: predictions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use crate::editor::DraftColumn;
    use crate::table::RawTable;

    #[derive(Clone, Default)]
    struct MemorySource {
        tables: Arc<Mutex<LoadedTables>>,
        saves: Arc<Mutex<usize>>,
        fail_save: bool,
        fail_load_after_save: bool,
    }

    impl DataSource for MemorySource {
        fn describe(&self) -> String {
            "memory".to_string()
        }

        fn load(&self) -> Result<LoadedTables> {
            if self.fail_load_after_save && *self.saves.lock().expect("saves lock") > 0 {
                return Err(TrackerError::unavailable(
                    "results",
                    crate::error::UnavailableReason::Unreachable,
                    "timeout",
                ));
            }
            Ok(self.tables.lock().expect("tables lock").clone())
        }

        fn save(&self, predictions: &[Prediction]) -> Result<()> {
            if self.fail_save {
                return Err(TrackerError::persistence("disk full"));
            }
            *self.saves.lock().expect("saves lock") += 1;
            self.tables.lock().expect("tables lock").predictions =
                reconcile::predictions_to_table(predictions);
            Ok(())
        }
    }

    fn grid(rows: &[&[&str]]) -> RawTable {
        RawTable::from_grid(
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    fn memory_source(fail_save: bool) -> MemorySource {
        let tables = LoadedTables {
            results: grid(&[
                &["match_id", "Date", "HomeTeam", "AwayTeam", "FTHG", "FTAG", "FTR"],
                &["1", "01/08/2025", "A", "B", "2", "1", "H"],
                &["2", "02/08/2025", "C", "D", "0", "0", "D"],
            ]),
            predictions: grid(&[
                &["match_id", "pred_home_score", "pred_away_score", "pred_winner"],
                &["1", "2", "1", "H"],
            ]),
        };
        MemorySource {
            tables: Arc::new(Mutex::new(tables)),
            fail_save,
            ..MemorySource::default()
        }
    }

    #[test]
    fn save_reloads_fresh_reconciliation() {
        let source = memory_source(false);
        let session = Session::new(Box::new(source.clone()));
        let before = session.load().expect("load");
        assert!(!before.records[1].has_prediction);

        let mut draft = PredictionDraft::from_predictions(&before.predictions);
        let row = draft.ensure_row_for("2");
        draft.set_cell(row, DraftColumn::HomeGoals, "1");
        draft.set_cell(row, DraftColumn::AwayGoals, "1");
        draft.set_cell(row, DraftColumn::Winner, "d");

        let after = session
            .save(&draft, &before.known_ids())
            .expect("save")
            .reloaded
            .expect("reload");
        assert_eq!(*source.saves.lock().expect("saves lock"), 1);
        assert_eq!(after.records[1].winner_correct, Some(true));
        assert_eq!(after.records[1].total_error, Some(2));
    }

    #[test]
    fn invalid_draft_never_reaches_the_backend() {
        let source = memory_source(false);
        let session = Session::new(Box::new(source.clone()));
        let snap = session.load().expect("load");

        let mut draft = PredictionDraft::from_predictions(&snap.predictions);
        draft.add_row("1");
        let err = session
            .save(&draft, &snap.known_ids())
            .expect_err("duplicate id");
        assert!(matches!(err, TrackerError::Validation(_)));
        assert_eq!(*source.saves.lock().expect("saves lock"), 0);
    }

    #[test]
    fn failed_write_keeps_prior_state() {
        let source = memory_source(true);
        let session = Session::new(Box::new(source.clone()));
        let snap = session.load().expect("load");

        let mut draft = PredictionDraft::from_predictions(&snap.predictions);
        draft.set_cell(0, DraftColumn::HomeGoals, "5");
        let err = session.save(&draft, &snap.known_ids()).expect_err("write fails");
        assert!(err.is_recoverable());
        assert!(draft.is_dirty());
        assert_eq!(session.load().expect("reload"), snap);
    }

    #[test]
    fn write_stands_when_reload_fails() {
        let source = MemorySource {
            fail_load_after_save: true,
            ..memory_source(false)
        };
        let session = Session::new(Box::new(source.clone()));
        let snap = session.load().expect("load");

        let mut draft = PredictionDraft::from_predictions(&snap.predictions);
        let row = draft.ensure_row_for("2");
        draft.set_cell(row, DraftColumn::HomeGoals, "0");
        draft.set_cell(row, DraftColumn::AwayGoals, "0");

        let outcome = session
            .save(&draft, &snap.known_ids())
            .expect("write succeeded");
        assert_eq!(outcome.saved.len(), 2);
        assert!(matches!(
            outcome.reloaded,
            Err(TrackerError::DataUnavailable { .. })
        ));
        let stored = reconcile::parse_predictions(
            &source.tables.lock().expect("tables lock").predictions,
        )
        .expect("stored predictions");
        assert_eq!(stored, outcome.saved);
    }
}
