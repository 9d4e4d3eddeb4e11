use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::config::{BackendConfig, Config, LocalConfig};
use crate::error::{Result, TrackerError, UnavailableReason};
use crate::reconcile::{Prediction, predictions_to_table};
use crate::sheets::SheetsSource;
use crate::table::{PREDICTIONS_TABLE, RESULTS_TABLE, RawTable};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadedTables {
    pub results: RawTable,
    pub predictions: RawTable,
}

pub trait DataSource: Send {
    fn describe(&self) -> String;

    fn load(&self) -> Result<LoadedTables>;

    /// Replaces the whole predictions table. On error the previous table is
    /// still the one on record.
    fn save(&self, predictions: &[Prediction]) -> Result<()>;
}

pub fn open_backend(config: &Config) -> Box<dyn DataSource> {
    match config.backend() {
        BackendConfig::Local(local) => Box::new(LocalCsvSource::new(local)),
        BackendConfig::Sheets(sheets) => Box::new(SheetsSource::new(sheets)),
    }
}

#[derive(Debug, Clone)]
pub struct LocalCsvSource {
    results_path: PathBuf,
    predictions_path: PathBuf,
}

impl LocalCsvSource {
    pub fn new(config: LocalConfig) -> Self {
        Self {
            results_path: config.results_path,
            predictions_path: config.predictions_path,
        }
    }

    pub fn predictions_path(&self) -> &Path {
        &self.predictions_path
    }
}

impl DataSource for LocalCsvSource {
    fn describe(&self) -> String {
        format!(
            "local files {} + {}",
            self.results_path.display(),
            self.predictions_path.display()
        )
    }

    fn load(&self) -> Result<LoadedTables> {
        Ok(LoadedTables {
            results: read_csv_table(RESULTS_TABLE, &self.results_path)?,
            predictions: read_csv_table(PREDICTIONS_TABLE, &self.predictions_path)?,
        })
    }

    fn save(&self, predictions: &[Prediction]) -> Result<()> {
        let table = predictions_to_table(predictions);
        write_csv_atomic(&self.predictions_path, &table)
            .map_err(|err| TrackerError::persistence(format!("{err:#}")))
    }
}

fn read_csv_table(table: &str, path: &Path) -> Result<RawTable> {
    let file = fs::File::open(path).map_err(|err| {
        TrackerError::unavailable(
            table,
            io_reason(&err),
            format!("{}: {err}", path.display()),
        )
    })?;
    let raw = RawTable::from_csv(io::BufReader::new(file)).map_err(|err| {
        TrackerError::unavailable(
            table,
            UnavailableReason::Malformed,
            format!("{}: {err:#}", path.display()),
        )
    })?;
    if raw.headers.is_empty() {
        return Err(TrackerError::unavailable(
            table,
            UnavailableReason::Malformed,
            format!("{} has no header row", path.display()),
        ));
    }
    Ok(raw)
}

fn write_csv_atomic(path: &Path, table: &RawTable) -> anyhow::Result<()> {
    let tmp = path.with_extension("csv.tmp");
    let written = (|| -> anyhow::Result<()> {
        let file = fs::File::create(&tmp)
            .with_context(|| format!("create {}", tmp.display()))?;
        table.write_csv(io::BufWriter::new(&file))?;
        file.sync_all().context("sync predictions file")?;
        fs::rename(&tmp, path)
            .with_context(|| format!("replace {}", path.display()))?;
        Ok(())
    })();
    if written.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    written
}

fn io_reason(err: &io::Error) -> UnavailableReason {
    match err.kind() {
        io::ErrorKind::NotFound => UnavailableReason::Missing,
        io::ErrorKind::PermissionDenied => UnavailableReason::PermissionDenied,
        _ => UnavailableReason::Unreachable,
    }
}
