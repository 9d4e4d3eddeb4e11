use std::fs;
use std::path::{Path, PathBuf};

use typer_terminal::config::LocalConfig;
use typer_terminal::editor::{DraftColumn, IssueKind, PredictionDraft};
use typer_terminal::error::TrackerError;
use typer_terminal::session::Session;
use typer_terminal::source::LocalCsvSource;

fn fixture_path(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    path
}

fn session_in(dir: &Path) -> Session {
    for name in ["results.csv", "predictions.csv"] {
        fs::copy(fixture_path(name), dir.join(name)).expect("copy fixture");
    }
    Session::new(Box::new(LocalCsvSource::new(LocalConfig {
        results_path: dir.join("results.csv"),
        predictions_path: dir.join("predictions.csv"),
    })))
}

#[test]
fn unchanged_draft_saves_idempotently() {
    let dir = tempfile::tempdir().expect("tempdir");
    let session = session_in(dir.path());
    let before = session.load().expect("load fixtures");

    let draft = PredictionDraft::from_predictions(&before.predictions);
    let first = session
        .save(&draft, &before.known_ids())
        .expect("first save")
        .reloaded
        .expect("reload after first save");
    let written_once = fs::read_to_string(dir.path().join("predictions.csv")).expect("read");

    let draft = PredictionDraft::from_predictions(&first.predictions);
    let second = session
        .save(&draft, &first.known_ids())
        .expect("second save")
        .reloaded
        .expect("reload after second save");
    let written_twice = fs::read_to_string(dir.path().join("predictions.csv")).expect("read");

    assert_eq!(written_once, written_twice);
    assert_eq!(first, second);
    assert_eq!(
        written_once.lines().next(),
        Some("match_id,pred_home_score,pred_away_score,pred_winner")
    );

    let before_flags: Vec<_> = before.records.iter().map(|r| r.winner_correct).collect();
    let after_flags: Vec<_> = second.records.iter().map(|r| r.winner_correct).collect();
    assert_eq!(before_flags, after_flags);
}

#[test]
fn new_pick_appears_in_reloaded_records() {
    let dir = tempfile::tempdir().expect("tempdir");
    let session = session_in(dir.path());
    let snap = session.load().expect("load fixtures");
    assert!(!snap.records[3].has_prediction);

    let mut draft = PredictionDraft::from_predictions(&snap.predictions);
    let row = draft.ensure_row_for("4");
    draft.set_cell(row, DraftColumn::HomeGoals, "3");
    draft.set_cell(row, DraftColumn::AwayGoals, "0");
    draft.set_cell(row, DraftColumn::Winner, "H");

    let after = session
        .save(&draft, &snap.known_ids())
        .expect("save")
        .reloaded
        .expect("reload");
    let rec = &after.records[3];
    assert!(rec.has_prediction);
    assert_eq!(rec.winner_correct, Some(true));
    assert_eq!(rec.exact_score, Some(true));
    assert_eq!(rec.total_error, Some(0));
    assert!(!dir.path().join("predictions.csv.tmp").exists());
}

#[test]
fn duplicate_match_id_is_rejected_and_file_untouched() {
    let dir = tempfile::tempdir().expect("tempdir");
    let session = session_in(dir.path());
    let snap = session.load().expect("load fixtures");
    let original = fs::read(dir.path().join("predictions.csv")).expect("read");

    let mut draft = PredictionDraft::from_predictions(&snap.predictions);
    let row = draft.add_row("5");
    draft.set_cell(row, DraftColumn::HomeGoals, "0");
    draft.set_cell(row, DraftColumn::AwayGoals, "2");
    draft.set_cell(row, DraftColumn::Winner, "A");

    match session.save(&draft, &snap.known_ids()) {
        Err(TrackerError::Validation(report)) => {
            assert_eq!(report.rows(), vec![row]);
            assert_eq!(report.issues[0].kind, IssueKind::DuplicateMatchId);
            assert_eq!(report.issues[0].match_id, "5");
        }
        other => panic!("expected validation error, got {other:?}"),
    }
    assert!(draft.is_dirty());
    assert_eq!(
        fs::read(dir.path().join("predictions.csv")).expect("read"),
        original
    );
}

#[test]
fn unknown_and_malformed_rows_are_all_reported() {
    let dir = tempfile::tempdir().expect("tempdir");
    let session = session_in(dir.path());
    let snap = session.load().expect("load fixtures");

    let mut draft = PredictionDraft::from_predictions(&snap.predictions);
    let unknown = draft.add_row("99");
    draft.set_cell(unknown, DraftColumn::HomeGoals, "1");
    draft.set_cell(unknown, DraftColumn::AwayGoals, "1");
    let bad = draft.ensure_row_for("4");
    draft.set_cell(bad, DraftColumn::HomeGoals, "two");
    draft.set_cell(bad, DraftColumn::AwayGoals, "0");

    let err = session
        .save(&draft, &snap.known_ids())
        .expect_err("draft has two bad rows");
    let TrackerError::Validation(report) = err else {
        panic!("expected validation error");
    };
    assert_eq!(report.rows(), vec![unknown, bad]);
    assert_eq!(report.issues[0].kind, IssueKind::UnknownMatchId);
    assert!(matches!(
        report.issues[1].kind,
        IssueKind::BadGoals {
            column: DraftColumn::HomeGoals,
            ..
        }
    ));
}

#[test]
fn half_entered_pick_never_reaches_the_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let session = session_in(dir.path());
    let snap = session.load().expect("load fixtures");
    let original = fs::read(dir.path().join("predictions.csv")).expect("read");

    let mut draft = PredictionDraft::from_predictions(&snap.predictions);
    let row = draft.ensure_row_for("4");
    draft.set_cell(row, DraftColumn::HomeGoals, "2");
    draft.set_cell(row, DraftColumn::Winner, "H");

    let err = session
        .save(&draft, &snap.known_ids())
        .expect_err("away score missing");
    let TrackerError::Validation(report) = err else {
        panic!("expected validation error");
    };
    assert_eq!(report.rows(), vec![row]);
    assert!(matches!(
        report.issues[0].kind,
        IssueKind::BadGoals {
            column: DraftColumn::AwayGoals,
            ..
        }
    ));
    assert_eq!(
        fs::read(dir.path().join("predictions.csv")).expect("read"),
        original
    );
}

#[test]
fn missing_results_file_is_data_unavailable() {
    let dir = tempfile::tempdir().expect("tempdir");
    let session = session_in(dir.path());
    fs::remove_file(dir.path().join("results.csv")).expect("remove results");

    let err = session.load().expect_err("results gone");
    assert!(matches!(err, TrackerError::DataUnavailable { .. }));
    assert!(!err.is_recoverable());
    assert!(err.user_message().contains("results"));
}
