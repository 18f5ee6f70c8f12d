use barvault_warehouse::{
    BarRecord, InstrumentRecord, StoreCounts, Warehouse, WarehouseConfig,
};
use serde::Serialize;

use crate::cli::InspectArgs;
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct InspectView {
    pub db_path: String,
    pub counts: StoreCounts,
    pub candlestick_index: bool,
    pub instruments: Vec<InstrumentBars>,
}

#[derive(Debug, Serialize)]
pub struct InstrumentBars {
    pub instrument: InstrumentRecord,
    pub latest: Vec<BarRecord>,
}

pub fn run(args: &InspectArgs) -> Result<InspectView, CliError> {
    let config = args
        .db
        .clone()
        .map(WarehouseConfig::at)
        .unwrap_or_default();
    let db_path = config.db_path.display().to_string();
    let warehouse = Warehouse::open_read_only(config)?;

    let instruments = match &args.symbol {
        Some(symbol) => warehouse
            .instruments_by_symbol(symbol)?
            .into_iter()
            .map(|instrument| {
                let latest = warehouse.latest_bars(instrument.id, args.limit)?;
                Ok(InstrumentBars { instrument, latest })
            })
            .collect::<Result<Vec<_>, CliError>>()?,
        None => Vec::new(),
    };

    Ok(InspectView {
        db_path,
        counts: warehouse.counts()?,
        candlestick_index: warehouse.has_candlestick_index()?,
        instruments,
    })
}
