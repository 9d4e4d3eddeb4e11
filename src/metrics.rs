use chrono::NaiveDate;

use crate::reconcile::ReconciledRecord;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub teams: Vec<String>,
    pub home_only: bool,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl RecordFilter {
    pub fn is_empty(&self) -> bool {
        self.teams.is_empty() && self.from.is_none() && self.to.is_none()
    }

    pub fn matches(&self, record: &ReconciledRecord) -> bool {
        let result = &record.result;
        if !self.teams.is_empty() {
            let hit = self.teams.iter().any(|team| {
                team == &result.home_team || (!self.home_only && team == &result.away_team)
            });
            if !hit {
                return false;
            }
        }
        if self.from.is_none() && self.to.is_none() {
            return true;
        }
        let Some(date) = result.date else {
            return false;
        };
        self.from.is_none_or(|from| date >= from) && self.to.is_none_or(|to| date <= to)
    }
}

/// Ratios are `None` when the subset holds no predicted match.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Metrics {
    pub matches: usize,
    pub predicted: usize,
    pub winner_hits: usize,
    pub winner_misses: usize,
    pub exact_hits: usize,
    pub win_accuracy: Option<f64>,
    pub exact_accuracy: Option<f64>,
    pub mean_goal_error: Option<f64>,
}

impl Metrics {
    pub fn has_data(&self) -> bool {
        self.predicted > 0
    }
}

pub fn filter_records<'a>(
    records: &'a [ReconciledRecord],
    filter: &RecordFilter,
) -> Vec<&'a ReconciledRecord> {
    records.iter().filter(|r| filter.matches(r)).collect()
}

pub fn aggregate(records: &[ReconciledRecord], filter: Option<&RecordFilter>) -> Metrics {
    let subset: Vec<&ReconciledRecord> = match filter {
        Some(filter) => filter_records(records, filter),
        None => records.iter().collect(),
    };
    aggregate_subset(&subset)
}

pub fn aggregate_subset(records: &[&ReconciledRecord]) -> Metrics {
    let mut metrics = Metrics {
        matches: records.len(),
        ..Metrics::default()
    };
    let mut error_sum = 0u64;
    let mut error_count = 0usize;

    for record in records.iter().filter(|r| r.has_prediction) {
        metrics.predicted += 1;
        match record.winner_correct {
            Some(true) => metrics.winner_hits += 1,
            Some(false) => metrics.winner_misses += 1,
            None => {}
        }
        if record.exact_score == Some(true) {
            metrics.exact_hits += 1;
        }
        if let Some(err) = record.total_error {
            error_sum += u64::from(err);
            error_count += 1;
        }
    }

    if metrics.predicted > 0 {
        let n = metrics.predicted as f64;
        metrics.win_accuracy = Some(metrics.winner_hits as f64 / n);
        metrics.exact_accuracy = Some(metrics.exact_hits as f64 / n);
    }
    if error_count > 0 {
        metrics.mean_goal_error = Some(error_sum as f64 / error_count as f64);
    }
    metrics
}

/// Sorted, de-duplicated team names for the filter picker.
pub fn team_names(records: &[ReconciledRecord], home_only: bool) -> Vec<String> {
    let mut teams: Vec<String> = records
        .iter()
        .flat_map(|r| {
            let away = (!home_only).then(|| r.result.away_team.clone());
            std::iter::once(r.result.home_team.clone()).chain(away)
        })
        .filter(|t| !t.is_empty())
        .collect();
    teams.sort();
    teams.dedup();
    teams
}

pub fn format_percent(ratio: Option<f64>) -> String {
    match ratio {
        Some(r) => format!("{:.1}%", r * 100.0),
        None => "no data".to_string(),
    }
}

pub fn format_error(mean: Option<f64>) -> String {
    match mean {
        Some(m) => format!("{m:.2}"),
        None => "no data".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::{MatchResult, Prediction, derive_record};

    fn record(id: &str, home: &str, away: &str, date: &str, pick: Option<(u32, u32, &str)>) -> ReconciledRecord {
        let result = MatchResult {
            match_id: id.to_string(),
            date_raw: date.to_string(),
            date: crate::table::parse_match_date(date),
            home_team: home.to_string(),
            away_team: away.to_string(),
            home_goals: 2,
            away_goals: 1,
            outcome: "H".to_string(),
        };
        let prediction = pick.map(|(h, a, w)| Prediction {
            match_id: id.to_string(),
            home_goals: Some(h),
            away_goals: Some(a),
            winner: w.to_string(),
        });
        derive_record(result, prediction)
    }

    #[test]
    fn unpredicted_rows_stay_out_of_the_denominator() {
        let records = vec![
            record("1", "A", "B", "01/08/2025", Some((2, 1, "H"))),
            record("2", "C", "D", "02/08/2025", None),
            record("3", "E", "F", "03/08/2025", Some((0, 0, "D"))),
        ];
        let m = aggregate(&records, None);
        assert_eq!(m.matches, 3);
        assert_eq!(m.predicted, 2);
        assert_eq!(m.win_accuracy, Some(0.5));
        assert_eq!(m.exact_accuracy, Some(0.5));
        assert_eq!(m.mean_goal_error, Some(1.5));
    }

    #[test]
    fn empty_subset_has_no_data() {
        let records = vec![record("2", "C", "D", "02/08/2025", None)];
        let m = aggregate(&records, None);
        assert!(!m.has_data());
        assert_eq!(m.win_accuracy, None);
        assert_eq!(m.mean_goal_error, None);
        assert_eq!(format_percent(m.win_accuracy), "no data");
        assert_eq!(aggregate(&[], None).matches, 0);
    }

    #[test]
    fn team_filter_respects_home_only() {
        let records = vec![
            record("1", "A", "B", "01/08/2025", Some((2, 1, "H"))),
            record("2", "B", "C", "02/08/2025", Some((0, 3, "A"))),
        ];
        let any_side = RecordFilter {
            teams: vec!["B".to_string()],
            ..RecordFilter::default()
        };
        assert_eq!(aggregate(&records, Some(&any_side)).predicted, 2);

        let home_only = RecordFilter {
            home_only: true,
            ..any_side
        };
        let m = aggregate(&records, Some(&home_only));
        assert_eq!(m.predicted, 1);
        assert_eq!(m.win_accuracy, Some(0.0));
    }

    #[test]
    fn date_bounds_are_inclusive_and_drop_undated_rows() {
        let records = vec![
            record("1", "A", "B", "01/08/2025", Some((2, 1, "H"))),
            record("2", "A", "B", "15/08/2025", Some((2, 1, "H"))),
            record("3", "A", "B", "tbd", Some((2, 1, "H"))),
        ];
        let filter = RecordFilter {
            from: NaiveDate::from_ymd_opt(2025, 8, 1),
            to: NaiveDate::from_ymd_opt(2025, 8, 10),
            ..RecordFilter::default()
        };
        let ids: Vec<&str> = filter_records(&records, &filter)
            .iter()
            .map(|r| r.match_id())
            .collect();
        assert_eq!(ids, vec!["1"]);
        assert_eq!(filter_records(&records, &RecordFilter::default()).len(), 3);
    }

    #[test]
    fn team_names_are_sorted_and_unique() {
        let records = vec![
            record("1", "Legia", "Lech", "01/08/2025", None),
            record("2", "Lech", "Wisla", "02/08/2025", None),
        ];
        assert_eq!(team_names(&records, true), vec!["Lech", "Legia"]);
        assert_eq!(team_names(&records, false), vec!["Lech", "Legia", "Wisla"]);
    }
}
