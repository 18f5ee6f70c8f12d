use std::fmt::{Display, Formatter};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Why the ingestion loop was told to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum StopReason {
    /// The writer drained its queue and closed the failure stream.
    WriterFinished,
    /// Storage could not be opened, migrated or prepared.
    PersistenceUnavailable,
    /// Consecutive per-instrument write failures reached the configured limit.
    PersistenceFailing { consecutive: u32 },
    SessionRenewalFailed,
    Interrupted,
}

impl StopReason {
    /// True for every reason except a clean writer finish.
    pub const fn is_abort(self) -> bool {
        !matches!(self, Self::WriterFinished)
    }
}

impl Display for StopReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WriterFinished => f.write_str("writer finished"),
            Self::PersistenceUnavailable => f.write_str("persistence unavailable"),
            Self::PersistenceFailing { consecutive } => {
                write!(f, "{consecutive} consecutive persistence failures")
            }
            Self::SessionRenewalFailed => f.write_str("session renewal failed"),
            Self::Interrupted => f.write_str("interrupted"),
        }
    }
}

/// Close-once broadcast stop flag.
///
/// The first [`raise`](StopSignal::raise) sets the reason; later raises are
/// ignored. Clones observe the same flag.
#[derive(Debug, Clone)]
pub struct StopSignal {
    sender: Arc<watch::Sender<Option<StopReason>>>,
}

impl StopSignal {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Returns true when this call was the one that raised the signal.
    pub fn raise(&self, reason: StopReason) -> bool {
        let raised = self.sender.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            true
        });

        if raised {
            if reason.is_abort() {
                warn!(%reason, "stop signal raised");
            } else {
                debug!(%reason, "stop signal raised");
            }
        }
        raised
    }

    pub fn is_raised(&self) -> bool {
        self.sender.borrow().is_some()
    }

    pub fn reason(&self) -> Option<StopReason> {
        *self.sender.borrow()
    }

    /// Resolves once the signal is raised, immediately if it already is.
    pub async fn wait(&self) -> StopReason {
        let mut receiver = self.sender.subscribe();
        loop {
            if let Some(reason) = *receiver.borrow_and_update() {
                return reason;
            }
            // The sender lives in `self`, so the channel cannot close here.
            if receiver.changed().await.is_err() {
                return StopReason::WriterFinished;
            }
        }
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}
