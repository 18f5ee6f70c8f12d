use std::sync::Arc;

use tracing::{info, warn};

use crate::source::{CandleRequest, MarketSource};
use crate::{Bar, IngestError, RateGate, SymbolId, UtcDateTime};

/// Retrieves the trailing daily window for a resolved instrument.
#[derive(Clone)]
pub struct Fetcher {
    source: Arc<dyn MarketSource>,
    gate: RateGate,
    lookback_years: u8,
}

impl Fetcher {
    pub fn new(source: Arc<dyn MarketSource>, gate: RateGate, lookback_years: u8) -> Self {
        Self {
            source,
            gate,
            lookback_years,
        }
    }

    /// Bars from `lookback_years` before now up to now, in the order the
    /// source returned them.
    pub async fn fetch(&self, id: SymbolId, symbol: &str) -> Result<Vec<Bar>, IngestError> {
        let end = UtcDateTime::now();
        let start = end.years_before(self.lookback_years);
        let request = CandleRequest::new(id, start, end).map_err(|source| {
            IngestError::FetchFailed {
                symbol: symbol.to_owned(),
                source,
            }
        })?;

        self.gate.acquire().await;
        match self.source.candles(request).await {
            Ok(bars) => {
                info!(symbol, id = %id, bars = bars.len(), "retrieved candles");
                Ok(bars)
            }
            Err(source) => {
                warn!(symbol, id = %id, code = source.code(), error = %source, "candle fetch failed");
                Err(IngestError::FetchFailed {
                    symbol: symbol.to_owned(),
                    source,
                })
            }
        }
    }
}
