use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::reconcile::Prediction;
use crate::table;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftColumn {
    MatchId,
    HomeGoals,
    AwayGoals,
    Winner,
}

impl DraftColumn {
    pub const ALL: [DraftColumn; 4] = [
        DraftColumn::MatchId,
        DraftColumn::HomeGoals,
        DraftColumn::AwayGoals,
        DraftColumn::Winner,
    ];

    pub fn next(self) -> Self {
        match self {
            DraftColumn::MatchId => DraftColumn::HomeGoals,
            DraftColumn::HomeGoals => DraftColumn::AwayGoals,
            DraftColumn::AwayGoals => DraftColumn::Winner,
            DraftColumn::Winner => DraftColumn::MatchId,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            DraftColumn::MatchId => DraftColumn::Winner,
            DraftColumn::HomeGoals => DraftColumn::MatchId,
            DraftColumn::AwayGoals => DraftColumn::HomeGoals,
            DraftColumn::Winner => DraftColumn::AwayGoals,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DraftColumn::MatchId => table::COL_MATCH_ID,
            DraftColumn::HomeGoals => table::COL_PRED_HOME,
            DraftColumn::AwayGoals => table::COL_PRED_AWAY,
            DraftColumn::Winner => table::COL_PRED_WINNER,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DraftRow {
    pub match_id: String,
    pub home: String,
    pub away: String,
    pub winner: String,
}

impl DraftRow {
    pub fn cell(&self, col: DraftColumn) -> &str {
        match col {
            DraftColumn::MatchId => &self.match_id,
            DraftColumn::HomeGoals => &self.home,
            DraftColumn::AwayGoals => &self.away,
            DraftColumn::Winner => &self.winner,
        }
    }

    fn cell_mut(&mut self, col: DraftColumn) -> &mut String {
        match col {
            DraftColumn::MatchId => &mut self.match_id,
            DraftColumn::HomeGoals => &mut self.home,
            DraftColumn::AwayGoals => &mut self.away,
            DraftColumn::Winner => &mut self.winner,
        }
    }

    fn is_blank(&self) -> bool {
        DraftColumn::ALL
            .iter()
            .all(|col| self.cell(*col).trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueKind {
    EmptyMatchId,
    DuplicateMatchId,
    UnknownMatchId,
    BadGoals { column: DraftColumn, detail: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowIssue {
    /// Zero-based draft row.
    pub row: usize,
    pub match_id: String,
    pub kind: IssueKind,
}

impl fmt::Display for RowIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let row = self.row + 1;
        match &self.kind {
            IssueKind::EmptyMatchId => write!(f, "row {row}: match_id is empty"),
            IssueKind::DuplicateMatchId => {
                write!(f, "row {row}: match_id {} appears more than once", self.match_id)
            }
            IssueKind::UnknownMatchId => {
                write!(f, "row {row}: match_id {} is not in results", self.match_id)
            }
            IssueKind::BadGoals { column, detail } => {
                write!(f, "row {row}: {} {detail}", column.label())
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub issues: Vec<RowIssue>,
}

impl ValidationReport {
    pub fn rows(&self) -> Vec<usize> {
        let mut rows: Vec<usize> = self.issues.iter().map(|i| i.row).collect();
        rows.dedup();
        rows
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.issues.iter().map(|i| i.to_string()).collect();
        f.write_str(&parts.join("; "))
    }
}

/// The editable candidate predictions table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PredictionDraft {
    pub rows: Vec<DraftRow>,
    dirty: bool,
}

impl PredictionDraft {
    pub fn from_predictions(predictions: &[Prediction]) -> Self {
        let opt = |v: Option<u32>| v.map(|g| g.to_string()).unwrap_or_default();
        Self {
            rows: predictions
                .iter()
                .map(|p| DraftRow {
                    match_id: p.match_id.clone(),
                    home: opt(p.home_goals),
                    away: opt(p.away_goals),
                    winner: p.winner.clone(),
                })
                .collect(),
            dirty: false,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn position(&self, match_id: &str) -> Option<usize> {
        let wanted = table::normalize_match_id(match_id);
        self.rows
            .iter()
            .position(|r| table::normalize_match_id(&r.match_id) == wanted)
    }

    pub fn set_cell(&mut self, row: usize, col: DraftColumn, value: &str) -> bool {
        let Some(target) = self.rows.get_mut(row) else {
            return false;
        };
        let cell = target.cell_mut(col);
        if cell != value {
            *cell = value.to_string();
            self.dirty = true;
        }
        true
    }

    pub fn add_row(&mut self, match_id: &str) -> usize {
        self.rows.push(DraftRow {
            match_id: match_id.to_string(),
            ..DraftRow::default()
        });
        self.dirty = true;
        self.rows.len() - 1
    }

    /// Reuses an existing row for the match before adding a new one.
    pub fn ensure_row_for(&mut self, match_id: &str) -> usize {
        match self.position(match_id) {
            Some(idx) => idx,
            None => self.add_row(match_id),
        }
    }

    pub fn remove_row(&mut self, row: usize) -> Option<DraftRow> {
        if row >= self.rows.len() {
            return None;
        }
        self.dirty = true;
        Some(self.rows.remove(row))
    }

    /// Fully blank rows are skipped. Every problem is reported, not just the
    /// first one, so the user can fix the whole table in one pass.
    pub fn validate(&self, known_ids: &HashSet<String>) -> Result<Vec<Prediction>, ValidationReport> {
        let mut issues = Vec::new();
        let mut first_seen: HashMap<String, usize> = HashMap::new();
        let mut out = Vec::with_capacity(self.rows.len());

        for (idx, row) in self.rows.iter().enumerate() {
            if row.is_blank() {
                continue;
            }
            let match_id = table::normalize_match_id(&row.match_id);
            let mut push = |kind: IssueKind| {
                issues.push(RowIssue {
                    row: idx,
                    match_id: match_id.clone(),
                    kind,
                })
            };

            if match_id.is_empty() {
                push(IssueKind::EmptyMatchId);
            } else if first_seen.contains_key(&match_id) {
                push(IssueKind::DuplicateMatchId);
            } else {
                first_seen.insert(match_id.clone(), idx);
                if !known_ids.contains(&match_id) {
                    push(IssueKind::UnknownMatchId);
                }
            }

            let mut goals = |column: DraftColumn| match table::parse_goals(row.cell(column)) {
                Ok(value) => value,
                Err(detail) => {
                    push(IssueKind::BadGoals { column, detail });
                    None
                }
            };
            let home_goals = goals(DraftColumn::HomeGoals);
            let away_goals = goals(DraftColumn::AwayGoals);
            // A score is either complete or absent.
            let missing = match (row.home.trim().is_empty(), row.away.trim().is_empty()) {
                (false, true) => Some((DraftColumn::AwayGoals, DraftColumn::HomeGoals)),
                (true, false) => Some((DraftColumn::HomeGoals, DraftColumn::AwayGoals)),
                _ => None,
            };
            if let Some((column, other)) = missing {
                push(IssueKind::BadGoals {
                    column,
                    detail: format!("is required when {} is set", other.label()),
                });
            }

            out.push(Prediction {
                match_id,
                home_goals,
                away_goals,
                winner: row.winner.trim().to_string(),
            });
        }

        if issues.is_empty() {
            Ok(out)
        } else {
            Err(ValidationReport { issues })
        }
    }
}
