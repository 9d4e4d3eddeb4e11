use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Duration as ChronoDuration, NaiveDate};
use rand::Rng;
use rand::seq::SliceRandom;

use crate::reconcile::{MatchResult, Prediction, predictions_to_table};
use crate::table::{RESULTS_COLUMNS, RawTable};

const TEAMS: &[&str] = &[
    "Arsenal",
    "Aston Villa",
    "Brighton",
    "Chelsea",
    "Everton",
    "Fulham",
    "Liverpool",
    "Man City",
    "Man United",
    "Newcastle",
    "Tottenham",
    "West Ham",
];

pub struct DemoData {
    pub results: Vec<MatchResult>,
    pub predictions: Vec<Prediction>,
}

/// A season slice with plausible scores. Roughly `pick_rate` of the matches
/// get a prediction, which is right about half the time.
pub fn generate<R: Rng>(rng: &mut R, matches: usize, pick_rate: f64) -> DemoData {
    let start = NaiveDate::from_ymd_opt(2025, 8, 15).unwrap_or_default();
    let mut results = Vec::with_capacity(matches);
    let mut predictions = Vec::new();

    for idx in 0..matches {
        let mut pair: Vec<&str> = TEAMS.choose_multiple(rng, 2).copied().collect();
        pair.shuffle(rng);
        let home_goals = goals(rng, 1.5);
        let away_goals = goals(rng, 1.1);
        let date = start + ChronoDuration::days((idx / 6) as i64 * 7 + (idx % 3) as i64);
        let match_id = (idx + 1).to_string();

        results.push(MatchResult {
            match_id: match_id.clone(),
            date_raw: date.format("%d/%m/%Y").to_string(),
            date: Some(date),
            home_team: pair[0].to_string(),
            away_team: pair[1].to_string(),
            home_goals,
            away_goals,
            outcome: outcome_code(home_goals, away_goals).to_string(),
        });

        if rng.gen_bool(pick_rate.clamp(0.0, 1.0)) {
            let (pred_home, pred_away) = if rng.gen_bool(0.45) {
                (home_goals, away_goals)
            } else {
                (goals(rng, 1.4), goals(rng, 1.2))
            };
            predictions.push(Prediction {
                match_id,
                home_goals: Some(pred_home),
                away_goals: Some(pred_away),
                winner: outcome_code(pred_home, pred_away).to_string(),
            });
        }
    }

    DemoData {
        results,
        predictions,
    }
}

pub fn write_demo_files(dir: &Path, data: &DemoData) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    let results_path = dir.join("results.csv");
    let predictions_path = dir.join("predictions.csv");

    let results = results_table(&data.results);
    let file = fs::File::create(&results_path)
        .with_context(|| format!("create {}", results_path.display()))?;
    results.write_csv(file)?;

    let file = fs::File::create(&predictions_path)
        .with_context(|| format!("create {}", predictions_path.display()))?;
    predictions_to_table(&data.predictions).write_csv(file)?;
    Ok(())
}

pub fn results_table(results: &[MatchResult]) -> RawTable {
    RawTable::new(
        RESULTS_COLUMNS.iter().map(|c| c.to_string()).collect(),
        results
            .iter()
            .map(|r| {
                vec![
                    r.match_id.clone(),
                    r.date_raw.clone(),
                    r.home_team.clone(),
                    r.away_team.clone(),
                    r.home_goals.to_string(),
                    r.away_goals.to_string(),
                    r.outcome.clone(),
                ]
            })
            .collect(),
    )
}

fn outcome_code(home: u32, away: u32) -> &'static str {
    if home > away {
        "H"
    } else if home < away {
        "A"
    } else {
        "D"
    }
}

// Knuth's poisson sampler; the means here are small.
fn goals<R: Rng>(rng: &mut R, mean: f64) -> u32 {
    let limit = (-mean).exp();
    let mut k = 0u32;
    let mut p = 1.0;
    loop {
        p *= rng.r#gen::<f64>();
        if p <= limit || k >= 9 {
            return k;
        }
        k += 1;
    }
}
