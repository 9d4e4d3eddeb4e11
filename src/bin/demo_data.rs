use std::path::PathBuf;

use anyhow::{Context, Result};

use typer_terminal::fake_data;

fn main() -> Result<()> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let dir = arg_value(&args, "--dir")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let matches = arg_value(&args, "--matches")
        .map(|raw| raw.parse::<usize>().context("--matches expects a number"))
        .transpose()?
        .unwrap_or(38);

    let mut rng = rand::thread_rng();
    let data = fake_data::generate(&mut rng, matches, 0.75);
    fake_data::write_demo_files(&dir, &data)?;

    println!("Demo data written to {}", dir.display());
    println!("Results: {}", data.results.len());
    println!("Predictions: {}", data.predictions.len());
    Ok(())
}

fn arg_value(args: &[String], flag: &str) -> Option<String> {
    let prefix = format!("{flag}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(value) = arg.strip_prefix(&prefix) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if arg == flag {
            let Some(next) = args.get(idx + 1) else {
                continue;
            };
            if !next.trim().is_empty() {
                return Some(next.trim().to_string());
            }
        }
    }
    None
}
