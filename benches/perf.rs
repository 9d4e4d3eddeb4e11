use criterion::{Criterion, criterion_group, criterion_main};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::hint::black_box;

use typer_terminal::fake_data;
use typer_terminal::metrics::{self, RecordFilter};
use typer_terminal::reconcile::{self, predictions_to_table};
use typer_terminal::table::RawTable;

fn season_tables(matches: usize) -> (RawTable, RawTable) {
    let mut rng = StdRng::seed_from_u64(42);
    let data = fake_data::generate(&mut rng, matches, 0.8);
    (
        fake_data::results_table(&data.results),
        predictions_to_table(&data.predictions),
    )
}

fn bench_reconcile(c: &mut Criterion) {
    let (results, predictions) = season_tables(380);
    c.bench_function("reconcile_season", |b| {
        b.iter(|| {
            let joined = reconcile::reconcile(black_box(&results), black_box(&predictions)).unwrap();
            black_box(joined.records.len());
        })
    });
}

fn bench_aggregate(c: &mut Criterion) {
    let (results, predictions) = season_tables(380);
    let records = reconcile::reconcile(&results, &predictions).unwrap().records;
    let filter = RecordFilter {
        teams: vec!["Arsenal".to_string(), "Liverpool".to_string()],
        ..RecordFilter::default()
    };

    c.bench_function("aggregate_all", |b| {
        b.iter(|| black_box(metrics::aggregate(black_box(&records), None)))
    });
    c.bench_function("aggregate_team_filter", |b| {
        b.iter(|| black_box(metrics::aggregate(black_box(&records), Some(&filter))))
    });
}

fn bench_csv_parse(c: &mut Criterion) {
    let (results, _) = season_tables(380);
    let mut bytes = Vec::new();
    results.write_csv(&mut bytes).unwrap();

    c.bench_function("results_csv_parse", |b| {
        b.iter(|| {
            let table = RawTable::from_csv(black_box(bytes.as_slice())).unwrap();
            black_box(table.rows.len());
        })
    });
}

criterion_group!(perf, bench_reconcile, bench_aggregate, bench_csv_parse);
criterion_main!(perf);
