use barvault_warehouse::{Warehouse, WarehouseConfig, WarehouseError};
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::failure::WriteFailure;
use crate::Instrument;

/// Counters returned when the writer's queue is closed and drained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterSummary {
    pub written: usize,
}

/// The only component that mutates the store.
///
/// [`open`](Writer::open) and [`run`](Writer::run) block on DuckDB, so both
/// belong on a blocking thread (`tokio::task::spawn_blocking`).
pub struct Writer {
    warehouse: Warehouse,
}

impl Writer {
    /// Open, migrate and prepare the store. A writer only exists once the
    /// store is usable.
    pub fn open(config: WarehouseConfig) -> Result<Self, WarehouseError> {
        let warehouse = Warehouse::open(config)?;
        warehouse.prepare_statements()?;
        info!(
            path = %warehouse.db_path().map(|path| path.display().to_string()).unwrap_or_default(),
            "writer ready"
        );
        Ok(Self { warehouse })
    }

    /// Drain `queue` until it is closed, writing each instrument in its own
    /// transaction. Failures go to `failures` and never end the loop early.
    pub fn run(
        self,
        mut queue: mpsc::Receiver<Instrument>,
        failures: mpsc::UnboundedSender<WriteFailure>,
    ) -> WriterSummary {
        let mut summary = WriterSummary::default();
        let mut consecutive = 0_u32;
        while let Some(instrument) = queue.blocking_recv() {
            match persist(&self.warehouse, &instrument) {
                Ok(()) => {
                    consecutive = 0;
                    summary.written += 1;
                    debug!(
                        symbol = %instrument.symbol(),
                        id = %instrument.id(),
                        bars = instrument.series().len(),
                        "instrument persisted"
                    );
                }
                Err(error) => {
                    consecutive = consecutive.saturating_add(1);
                    let id = instrument.id();
                    report(
                        &failures,
                        WriteFailure::Rejected {
                            seed: instrument.into_seed(),
                            id,
                            error,
                            consecutive,
                        },
                    );
                }
            }
        }

        info!(written = summary.written, "writer drained");
        summary
    }
}

fn persist(warehouse: &Warehouse, instrument: &Instrument) -> Result<(), WarehouseError> {
    let (row, bars) = instrument
        .to_records()
        .map_err(|error| WarehouseError::InvalidData(error.to_string()))?;
    warehouse.store_instrument(&row, &bars)
}

fn report(failures: &mpsc::UnboundedSender<WriteFailure>, failure: WriteFailure) {
    // The sink only goes away after the writer returns.
    if let Err(mpsc::error::SendError(failure)) = failures.send(failure) {
        tracing::error!(error = %failure, "failure sink is gone");
    }
}
