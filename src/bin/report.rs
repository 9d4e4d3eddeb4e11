use std::path::PathBuf;

use anyhow::{Context, Result};

use typer_terminal::config::Config;
use typer_terminal::export;
use typer_terminal::metrics::{self, RecordFilter};
use typer_terminal::session::Session;
use typer_terminal::table::parse_match_date;

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    let config = Config::from_env();
    let args = std::env::args().skip(1).collect::<Vec<_>>();

    let mut filter = RecordFilter {
        from: config.filter_from,
        to: config.filter_to,
        ..RecordFilter::default()
    };
    filter.teams = arg_values(&args, "--team");
    filter.home_only = args.iter().any(|a| a == "--home-only");
    if let Some(raw) = arg_value(&args, "--from") {
        let date = parse_match_date(&raw).with_context(|| format!("bad --from date {raw:?}"))?;
        filter.from = Some(date);
    }
    if let Some(raw) = arg_value(&args, "--to") {
        let date = parse_match_date(&raw).with_context(|| format!("bad --to date {raw:?}"))?;
        filter.to = Some(date);
    }

    let session = Session::open(&config);
    println!("Source: {}", session.describe());
    let snapshot = session.load().map_err(|err| anyhow::anyhow!(err.user_message()))?;

    let visible = metrics::filter_records(&snapshot.records, &filter);
    let summary = metrics::aggregate_subset(&visible);

    println!("Matches: {}", summary.matches);
    println!("Predicted: {}", summary.predicted);
    println!(
        "Winner accuracy: {}",
        metrics::format_percent(summary.win_accuracy)
    );
    println!(
        "Exact scores: {}",
        metrics::format_percent(summary.exact_accuracy)
    );
    println!(
        "Mean goal error: {}",
        metrics::format_error(summary.mean_goal_error)
    );
    if !snapshot.orphaned.is_empty() {
        println!(
            "Predictions without a match: {}",
            snapshot.orphaned.join(", ")
        );
    }

    if let Some(path) = arg_value(&args, "--xlsx").map(PathBuf::from) {
        let records = visible.into_iter().cloned().collect::<Vec<_>>();
        let report = export::export_records(&path, &records, &summary, config.safe_mode)?;
        println!("Exported {} rows to {}", report.records, path.display());
    }

    Ok(())
}

fn arg_value(args: &[String], flag: &str) -> Option<String> {
    arg_values(args, flag).into_iter().next()
}

fn arg_values(args: &[String], flag: &str) -> Vec<String> {
    let prefix = format!("{flag}=");
    let mut out = Vec::new();
    for (idx, arg) in args.iter().enumerate() {
        if let Some(value) = arg.strip_prefix(&prefix) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                out.push(trimmed.to_string());
            }
        }
        if arg == flag {
            let Some(next) = args.get(idx + 1) else {
                continue;
            };
            if !next.trim().is_empty() {
                out.push(next.trim().to_string());
            }
        }
    }
    out
}
