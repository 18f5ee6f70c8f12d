use serde::Serialize;

use crate::{InstrumentSeed, StopReason};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotSavedReason {
    /// No exact (symbol, exchange) match, or the lookup call failed.
    NotFound,
    FetchFailed,
    /// The writer rolled back this instrument's transaction.
    PersistFailed,
    /// Completed but the writer was gone before it could be queued.
    Discarded,
    /// Never processed because the run stopped first.
    Skipped,
}

impl NotSavedReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::FetchFailed => "fetch_failed",
            Self::PersistFailed => "persist_failed",
            Self::Discarded => "discarded",
            Self::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotSaved {
    pub seed: InstrumentSeed,
    pub reason: NotSavedReason,
}

impl NotSaved {
    pub fn new(seed: InstrumentSeed, reason: NotSavedReason) -> Self {
        Self { seed, reason }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    Aborted { reason: StopReason },
}

/// Final result of one ingestion run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Instruments committed by the writer.
    pub saved: usize,
    pub not_saved: Vec<NotSaved>,
    pub outcome: RunOutcome,
}

impl IngestReport {
    pub fn not_saved_symbols(&self) -> Vec<&str> {
        self.not_saved
            .iter()
            .map(|entry| entry.seed.symbol.as_str())
            .collect()
    }

    pub fn count(&self, reason: NotSavedReason) -> usize {
        self.not_saved
            .iter()
            .filter(|entry| entry.reason == reason)
            .count()
    }

    pub const fn is_aborted(&self) -> bool {
        matches!(self.outcome, RunOutcome::Aborted { .. })
    }
}
