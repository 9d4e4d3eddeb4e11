use std::fmt;

use thiserror::Error;

use crate::editor::ValidationReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnavailableReason {
    Missing,
    Unreachable,
    PermissionDenied,
    Malformed,
}

impl fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            UnavailableReason::Missing => "missing",
            UnavailableReason::Unreachable => "unreachable",
            UnavailableReason::PermissionDenied => "permission denied",
            UnavailableReason::Malformed => "malformed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("{table} table {reason}: {detail}")]
    DataUnavailable {
        table: String,
        reason: UnavailableReason,
        detail: String,
    },

    #[error("schema error in {table}: {detail}")]
    Schema { table: String, detail: String },

    #[error("{0}")]
    Validation(ValidationReport),

    #[error("failed to save predictions: {detail}")]
    Persistence { detail: String },
}

pub type Result<T> = std::result::Result<T, TrackerError>;

impl TrackerError {
    pub fn unavailable(
        table: impl Into<String>,
        reason: UnavailableReason,
        detail: impl Into<String>,
    ) -> Self {
        TrackerError::DataUnavailable {
            table: table.into(),
            reason,
            detail: detail.into(),
        }
    }

    pub fn schema(table: impl Into<String>, detail: impl Into<String>) -> Self {
        TrackerError::Schema {
            table: table.into(),
            detail: detail.into(),
        }
    }

    pub fn persistence(detail: impl Into<String>) -> Self {
        TrackerError::Persistence {
            detail: detail.into(),
        }
    }

    /// Save failures and bad edits leave the session usable; load-side
    /// failures mean nothing can be shown until the data is fixed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TrackerError::Validation(_) | TrackerError::Persistence { .. }
        )
    }

    pub fn user_message(&self) -> String {
        match self {
            TrackerError::DataUnavailable {
                table,
                reason,
                detail,
            } => format!("Cannot load {table} ({reason}): {detail}"),
            TrackerError::Schema { table, detail } => {
                format!("The {table} table has an unexpected layout: {detail}")
            }
            TrackerError::Validation(report) => {
                format!("Save blocked, fix these rows first: {report}")
            }
            TrackerError::Persistence { detail } => {
                format!("Save failed, your edits are kept, try again: {detail}")
            }
        }
    }
}
