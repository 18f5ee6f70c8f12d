//! Instrument universe loading.
//!
//! The universe is a JSON array of objects with `symbol`, `name`, `industry`,
//! `subindustry` and `exchange` keys. Order is preserved: it is the order in
//! which the pipeline processes instruments.

use std::path::Path;

use tracing::info;

use crate::{CoreError, InstrumentSeed};

pub fn load_universe(path: impl AsRef<Path>) -> Result<Vec<InstrumentSeed>, CoreError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|source| CoreError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let seeds = parse_universe(&raw)?;
    info!(path = %path.display(), instruments = seeds.len(), "loaded universe");
    Ok(seeds)
}

pub fn parse_universe(raw: &str) -> Result<Vec<InstrumentSeed>, CoreError> {
    let seeds: Vec<InstrumentSeed> = serde_json::from_str(raw)?;
    for seed in &seeds {
        seed.validate()?;
    }
    Ok(seeds)
}
