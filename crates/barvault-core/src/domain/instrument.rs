use std::fmt::{Display, Formatter};

use barvault_warehouse::{BarRecord, InstrumentRecord};
use serde::{Deserialize, Serialize};

use crate::{Bar, ValidationError};

/// Source-assigned internal identifier of an instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymbolId(i64);

impl SymbolId {
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> i64 {
        self.0
    }
}

impl Display for SymbolId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One entry of the static instrument universe.
///
/// Symbol and exchange are kept exactly as given: resolution compares them
/// case-sensitively against the source's listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentSeed {
    pub symbol: String,
    pub exchange: String,
    pub name: String,
    #[serde(default)]
    pub industry: String,
    #[serde(default)]
    pub subindustry: String,
}

impl InstrumentSeed {
    pub fn new(
        symbol: impl Into<String>,
        exchange: impl Into<String>,
        name: impl Into<String>,
        industry: impl Into<String>,
        subindustry: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let seed = Self {
            symbol: symbol.into(),
            exchange: exchange.into(),
            name: name.into(),
            industry: industry.into(),
            subindustry: subindustry.into(),
        };
        seed.validate()?;
        Ok(seed)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.symbol.trim().is_empty() {
            return Err(ValidationError::EmptySeedField { field: "symbol" });
        }
        if self.exchange.trim().is_empty() {
            return Err(ValidationError::EmptySeedField { field: "exchange" });
        }
        Ok(())
    }

    /// Attach the identifier found by the resolver.
    pub fn resolved(self, id: SymbolId) -> ResolvedInstrument {
        ResolvedInstrument { seed: self, id }
    }
}

/// A seed whose internal identifier is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedInstrument {
    seed: InstrumentSeed,
    id: SymbolId,
}

impl ResolvedInstrument {
    pub fn id(&self) -> SymbolId {
        self.id
    }

    pub fn seed(&self) -> &InstrumentSeed {
        &self.seed
    }

    pub fn into_seed(self) -> InstrumentSeed {
        self.seed
    }

    /// Attach the fetched candlesticks, completing the instrument.
    pub fn with_series(self, series: Vec<Bar>) -> Instrument {
        Instrument {
            seed: self.seed,
            id: self.id,
            series,
        }
    }
}

/// A fully populated instrument, ready for the writer.
#[derive(Debug, Clone, PartialEq)]
pub struct Instrument {
    seed: InstrumentSeed,
    id: SymbolId,
    series: Vec<Bar>,
}

impl Instrument {
    pub fn id(&self) -> SymbolId {
        self.id
    }

    pub fn seed(&self) -> &InstrumentSeed {
        &self.seed
    }

    pub fn symbol(&self) -> &str {
        &self.seed.symbol
    }

    pub fn series(&self) -> &[Bar] {
        &self.series
    }

    pub fn into_seed(self) -> InstrumentSeed {
        self.seed
    }

    /// Warehouse rows for this instrument and its bars.
    pub fn to_records(&self) -> Result<(InstrumentRecord, Vec<BarRecord>), ValidationError> {
        let id = self.id.get();
        let instrument = InstrumentRecord {
            id,
            symbol: self.seed.symbol.clone(),
            exchange: self.seed.exchange.clone(),
            name: self.seed.name.clone(),
            industry: self.seed.industry.clone(),
            subindustry: self.seed.subindustry.clone(),
        };

        let bars = self
            .series
            .iter()
            .map(|bar| {
                let volume = i64::try_from(bar.volume)
                    .map_err(|_| ValidationError::VolumeOutOfRange { volume: bar.volume })?;
                Ok(BarRecord {
                    id,
                    start: bar.start.format_sql(),
                    end: bar.end.format_sql(),
                    open: bar.open,
                    close: bar.close,
                    high: bar.high,
                    low: bar.low,
                    volume,
                })
            })
            .collect::<Result<Vec<_>, ValidationError>>()?;

        Ok((instrument, bars))
    }
}
