use std::path::PathBuf;
use std::sync::mpsc::{Receiver, Sender};
use std::thread;

use crate::export;
use crate::session::Session;
use crate::state::{Delta, ProviderCommand};

/// Runs every load, save and export on one background thread, in the order
/// the commands arrive, so there is never more than one writer.
pub fn spawn_provider(
    session: Session,
    tx: Sender<Delta>,
    cmd_rx: Receiver<ProviderCommand>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let _ = tx.send(Delta::Log(format!(
            "[INFO] Data source: {}",
            session.describe()
        )));
        while let Ok(cmd) = cmd_rx.recv() {
            if !handle_command(&session, &tx, cmd) {
                break;
            }
        }
    })
}

/// Returns false once the UI side has hung up.
pub fn handle_command(session: &Session, tx: &Sender<Delta>, cmd: ProviderCommand) -> bool {
    let deltas = match cmd {
        ProviderCommand::Reload => match session.load() {
            Ok(snapshot) => vec![Delta::Loaded(snapshot)],
            Err(err) => vec![Delta::LoadFailed(err)],
        },
        ProviderCommand::Save { draft, known_ids } => match session.save(&draft, &known_ids) {
            Ok(outcome) => match outcome.reloaded {
                Ok(snapshot) => vec![Delta::Saved(snapshot)],
                Err(err) => vec![Delta::Persisted(outcome.saved), Delta::LoadFailed(err)],
            },
            Err(err) => vec![Delta::SaveFailed(err)],
        },
        ProviderCommand::Export {
            path,
            records,
            metrics,
            safe_mode,
        } => {
            let path = PathBuf::from(path);
            match export::export_records(&path, &records, &metrics, safe_mode) {
                Ok(report) => vec![Delta::ExportFinished {
                    path: path.display().to_string(),
                    records: report.records,
                    predicted: report.predicted,
                }],
                Err(err) => vec![Delta::Log(format!("[ERROR] Export failed: {err:#}"))],
            }
        }
    };
    deltas.into_iter().all(|delta| tx.send(delta).is_ok())
}
