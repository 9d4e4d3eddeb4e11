use std::collections::{HashSet, VecDeque};

use chrono::NaiveDate;

use crate::editor::{DraftColumn, PredictionDraft};
use crate::error::TrackerError;
use crate::metrics::{self, Metrics, RecordFilter};
use crate::reconcile::{self, Prediction, ReconciledRecord, RevealPolicy};
use crate::session::Snapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Dashboard,
    Matches,
    Editor,
}

#[derive(Debug)]
pub enum Delta {
    Loaded(Snapshot),
    LoadFailed(TrackerError),
    Saved(Snapshot),
    /// The write landed but the reload after it did not; a `LoadFailed`
    /// follows.
    Persisted(Vec<Prediction>),
    SaveFailed(TrackerError),
    ExportFinished {
        path: String,
        records: usize,
        predicted: usize,
    },
    Log(String),
}

#[derive(Debug, Clone)]
pub enum ProviderCommand {
    Reload,
    Save {
        draft: PredictionDraft,
        known_ids: HashSet<String>,
    },
    Export {
        path: String,
        records: Vec<ReconciledRecord>,
        metrics: Metrics,
        safe_mode: bool,
    },
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub screen: Screen,
    pub safe_mode: bool,
    pub data_ready: bool,
    pub loading: bool,
    pub saving: bool,
    pub records: Vec<ReconciledRecord>,
    pub predictions: Vec<Prediction>,
    pub known_ids: HashSet<String>,
    pub filter: RecordFilter,
    pub team_options: Vec<String>,
    pub team_selected: Option<usize>,
    pub metrics: Metrics,
    pub selected: usize,
    pub draft: PredictionDraft,
    pub editor_row: usize,
    pub editor_col: DraftColumn,
    pub input: Option<String>,
    pub invalid_rows: Vec<usize>,
    pub status: Option<String>,
    pub last_error: Option<String>,
    pub logs: VecDeque<String>,
    pub help_overlay: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        Self {
            screen: Screen::Dashboard,
            safe_mode: false,
            data_ready: false,
            loading: false,
            saving: false,
            records: Vec::new(),
            predictions: Vec::new(),
            known_ids: HashSet::new(),
            filter: RecordFilter::default(),
            team_options: Vec::new(),
            team_selected: None,
            metrics: Metrics::default(),
            selected: 0,
            draft: PredictionDraft::default(),
            editor_row: 0,
            editor_col: DraftColumn::MatchId,
            input: None,
            invalid_rows: Vec::new(),
            status: None,
            last_error: None,
            logs: VecDeque::new(),
            help_overlay: false,
        }
    }

    pub fn with_options(safe_mode: bool, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        let mut state = Self::new();
        state.safe_mode = safe_mode;
        state.filter.from = from;
        state.filter.to = to;
        state
    }

    pub fn push_log(&mut self, msg: impl Into<String>) {
        const MAX_LOGS: usize = 200;
        self.logs.push_back(msg.into());
        while self.logs.len() > MAX_LOGS {
            self.logs.pop_front();
        }
    }

    pub fn reveal(&self, record: &ReconciledRecord) -> RevealPolicy {
        if self.safe_mode {
            reconcile::gate(record)
        } else {
            RevealPolicy::Revealed
        }
    }

    pub fn toggle_safe_mode(&mut self) {
        self.safe_mode = !self.safe_mode;
        let label = if self.safe_mode { "on" } else { "off" };
        self.push_log(format!("[INFO] Safe mode {label}"));
    }

    pub fn visible_records(&self) -> Vec<&ReconciledRecord> {
        metrics::filter_records(&self.records, &self.filter)
    }

    pub fn selected_record(&self) -> Option<&ReconciledRecord> {
        self.visible_records().get(self.selected).copied()
    }

    pub fn selected_match_id(&self) -> Option<String> {
        self.selected_record().map(|r| r.result.match_id.clone())
    }

    pub fn record_by_id(&self, match_id: &str) -> Option<&ReconciledRecord> {
        let wanted = crate::table::normalize_match_id(match_id);
        self.records.iter().find(|r| r.result.match_id == wanted)
    }

    pub fn select_next(&mut self) {
        let total = self.visible_records().len();
        if total == 0 {
            self.selected = 0;
            return;
        }
        self.selected = (self.selected + 1) % total;
    }

    pub fn select_prev(&mut self) {
        let total = self.visible_records().len();
        if total == 0 {
            self.selected = 0;
            return;
        }
        if self.selected == 0 {
            self.selected = total - 1;
        } else {
            self.selected -= 1;
        }
    }

    /// Keeps the same match selected when it is still visible, otherwise
    /// starts again from the top.
    fn restore_selection(&mut self, match_id: Option<String>) {
        if let Some(id) = match_id {
            if let Some(pos) = self
                .visible_records()
                .iter()
                .position(|r| r.result.match_id == id)
            {
                self.selected = pos;
                return;
            }
        }
        self.selected = 0;
    }

    pub fn refresh_metrics(&mut self) {
        self.metrics = metrics::aggregate(&self.records, Some(&self.filter));
    }

    pub fn team_filter_label(&self) -> String {
        match self.team_selected.and_then(|idx| self.team_options.get(idx)) {
            Some(team) if self.filter.home_only => format!("{team} (home)"),
            Some(team) => team.clone(),
            None => "All teams".to_string(),
        }
    }

    pub fn cycle_team_filter(&mut self) {
        let selected_id = self.selected_match_id();
        self.team_selected = match self.team_selected {
            None if !self.team_options.is_empty() => Some(0),
            Some(idx) if idx + 1 < self.team_options.len() => Some(idx + 1),
            _ => None,
        };
        self.apply_team_filter();
        self.restore_selection(selected_id);
    }

    pub fn toggle_home_only(&mut self) {
        let selected_id = self.selected_match_id();
        let team = self
            .team_selected
            .and_then(|idx| self.team_options.get(idx))
            .cloned();
        self.filter.home_only = !self.filter.home_only;
        self.team_options = metrics::team_names(&self.records, self.filter.home_only);
        self.team_selected = team.and_then(|t| self.team_options.iter().position(|o| o == &t));
        self.apply_team_filter();
        self.restore_selection(selected_id);
    }

    fn apply_team_filter(&mut self) {
        self.filter.teams = self
            .team_selected
            .and_then(|idx| self.team_options.get(idx))
            .map(|team| vec![team.clone()])
            .unwrap_or_default();
        self.refresh_metrics();
    }

    /// Replaces all derived state with a fresh snapshot. Unsaved edits
    /// survive a plain reload unless `replace_draft` is set.
    pub fn install_snapshot(&mut self, snapshot: Snapshot, replace_draft: bool) {
        let selected_id = self.selected_match_id();
        let team = self
            .team_selected
            .and_then(|idx| self.team_options.get(idx))
            .cloned();

        let known_ids = snapshot.known_ids();
        self.records = snapshot.records;
        self.predictions = snapshot.predictions;
        self.known_ids = known_ids;
        self.data_ready = true;
        self.last_error = None;

        self.team_options = metrics::team_names(&self.records, self.filter.home_only);
        self.team_selected = team.and_then(|t| self.team_options.iter().position(|o| o == &t));
        self.apply_team_filter();
        self.restore_selection(selected_id);

        if replace_draft || !self.draft.is_dirty() {
            self.draft = PredictionDraft::from_predictions(&self.predictions);
            self.invalid_rows.clear();
        } else {
            self.push_log("[INFO] Keeping unsaved edits over the reloaded predictions");
        }
        self.clamp_editor_cursor();

        if !snapshot.orphaned.is_empty() {
            self.push_log(format!(
                "[WARN] {} prediction(s) reference unknown matches: {}",
                snapshot.orphaned.len(),
                snapshot.orphaned.join(", ")
            ));
        }
    }

    pub fn reload_command(&mut self) -> Option<ProviderCommand> {
        if self.loading || self.saving {
            self.push_log("[INFO] Busy, reload skipped");
            return None;
        }
        self.loading = true;
        Some(ProviderCommand::Reload)
    }

    pub fn save_command(&mut self) -> Option<ProviderCommand> {
        if !self.data_ready {
            self.push_log("[WARN] Nothing loaded, cannot save");
            return None;
        }
        if self.saving || self.loading {
            self.push_log("[INFO] Busy, save skipped");
            return None;
        }
        self.commit_input();
        self.saving = true;
        self.status = Some("Saving...".to_string());
        Some(ProviderCommand::Save {
            draft: self.draft.clone(),
            known_ids: self.known_ids.clone(),
        })
    }

    pub fn export_command(&mut self, path: impl Into<String>) -> Option<ProviderCommand> {
        if !self.data_ready {
            self.push_log("[WARN] Nothing loaded, nothing to export");
            return None;
        }
        let records = self.visible_records().into_iter().cloned().collect();
        Some(ProviderCommand::Export {
            path: path.into(),
            records,
            metrics: self.metrics,
            safe_mode: self.safe_mode,
        })
    }

    /// Drops everything derived from the last load. Only a successful
    /// reload brings the view back.
    pub fn clear_view(&mut self) {
        self.data_ready = false;
        self.records.clear();
        self.known_ids.clear();
        self.refresh_metrics();
        self.selected = 0;
    }

    // Editor

    pub fn clamp_editor_cursor(&mut self) {
        let total = self.draft.len();
        if total == 0 {
            self.editor_row = 0;
        } else if self.editor_row >= total {
            self.editor_row = total - 1;
        }
    }

    pub fn editor_next_row(&mut self) {
        self.commit_input();
        if self.draft.is_empty() {
            return;
        }
        self.editor_row = (self.editor_row + 1) % self.draft.len();
    }

    pub fn editor_prev_row(&mut self) {
        self.commit_input();
        if self.draft.is_empty() {
            return;
        }
        self.editor_row = if self.editor_row == 0 {
            self.draft.len() - 1
        } else {
            self.editor_row - 1
        };
    }

    pub fn editor_next_col(&mut self) {
        self.commit_input();
        self.editor_col = self.editor_col.next();
    }

    pub fn editor_prev_col(&mut self) {
        self.commit_input();
        self.editor_col = self.editor_col.prev();
    }

    pub fn is_editing(&self) -> bool {
        self.input.is_some()
    }

    pub fn begin_cell_edit(&mut self) {
        let Some(row) = self.draft.rows.get(self.editor_row) else {
            return;
        };
        self.input = Some(row.cell(self.editor_col).to_string());
    }

    pub fn input_push(&mut self, c: char) {
        if let Some(buf) = self.input.as_mut() {
            buf.push(c);
        }
    }

    pub fn input_pop(&mut self) {
        if let Some(buf) = self.input.as_mut() {
            buf.pop();
        }
    }

    pub fn commit_input(&mut self) {
        let Some(value) = self.input.take() else {
            return;
        };
        self.draft
            .set_cell(self.editor_row, self.editor_col, value.trim());
    }

    pub fn cancel_input(&mut self) {
        self.input = None;
    }

    pub fn editor_add_row(&mut self) {
        self.commit_input();
        self.editor_row = self.draft.add_row("");
        self.editor_col = DraftColumn::MatchId;
        self.begin_cell_edit();
    }

    pub fn editor_remove_row(&mut self) {
        self.input = None;
        if let Some(row) = self.draft.remove_row(self.editor_row) {
            let id = if row.match_id.is_empty() {
                "(blank)".to_string()
            } else {
                row.match_id
            };
            self.push_log(format!("[INFO] Removed draft row for match {id}"));
        }
        self.invalid_rows.clear();
        self.clamp_editor_cursor();
    }

    pub fn revert_draft(&mut self) {
        self.input = None;
        self.draft = PredictionDraft::from_predictions(&self.predictions);
        self.invalid_rows.clear();
        self.clamp_editor_cursor();
        self.push_log("[INFO] Draft reverted to saved predictions");
    }

    /// Opens the editor on the selected match, adding a row for it when the
    /// match has no prediction yet.
    pub fn pick_selected(&mut self) {
        let Some(match_id) = self.selected_match_id() else {
            return;
        };
        self.commit_input();
        self.editor_row = self.draft.ensure_row_for(&match_id);
        self.editor_col = DraftColumn::HomeGoals;
        self.screen = Screen::Editor;
        self.begin_cell_edit();
    }

    pub fn draft_row_label(&self, row: usize) -> String {
        let Some(draft_row) = self.draft.rows.get(row) else {
            return String::new();
        };
        match self.record_by_id(&draft_row.match_id) {
            Some(record) => format!("{} vs {}", record.result.home_team, record.result.away_team),
            None if draft_row.match_id.trim().is_empty() => "-".to_string(),
            None => "unknown match".to_string(),
        }
    }
}

pub fn apply_delta(state: &mut AppState, delta: Delta) {
    match delta {
        Delta::Loaded(snapshot) => {
            state.loading = false;
            let records = snapshot.records.len();
            let predicted = snapshot.records.iter().filter(|r| r.has_prediction).count();
            state.install_snapshot(snapshot, false);
            state.push_log(format!(
                "[INFO] Loaded {records} matches, {predicted} predicted"
            ));
        }
        Delta::LoadFailed(err) => {
            state.loading = false;
            state.clear_view();
            let msg = err.user_message();
            state.push_log(format!("[ERROR] {msg}"));
            state.last_error = Some(msg);
        }
        Delta::Saved(snapshot) => {
            state.saving = false;
            let saved = snapshot.predictions.len();
            state.install_snapshot(snapshot, true);
            state.status = Some(format!("Saved {saved} prediction(s)"));
            state.push_log(format!("[INFO] Saved {saved} prediction(s), view reloaded"));
        }
        Delta::Persisted(saved) => {
            state.saving = false;
            state.draft = PredictionDraft::from_predictions(&saved);
            state.invalid_rows.clear();
            state.clamp_editor_cursor();
            state.status = Some(format!(
                "Saved {} prediction(s), reload failed",
                saved.len()
            ));
            state.push_log(format!(
                "[INFO] Saved {} prediction(s), reloading the view failed",
                saved.len()
            ));
            state.predictions = saved;
        }
        Delta::SaveFailed(err) => {
            state.saving = false;
            if let TrackerError::Validation(report) = &err {
                state.invalid_rows = report.rows();
                for issue in &report.issues {
                    state.push_log(format!("[WARN] {issue}"));
                }
            } else {
                state.push_log(format!("[ERROR] {err}"));
            }
            if !err.is_recoverable() {
                state.last_error = Some(err.user_message());
                state.clear_view();
            }
            state.status = Some(err.user_message());
        }
        Delta::ExportFinished {
            path,
            records,
            predicted,
        } => {
            state.push_log(format!(
                "[INFO] Exported {records} rows ({predicted} predicted) to {path}"
            ));
            state.status = Some(format!("Exported to {path}"));
        }
        Delta::Log(msg) => state.push_log(msg),
    }
}
