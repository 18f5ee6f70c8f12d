use std::sync::Arc;

use tracing::{debug, warn};

use crate::source::{MarketSource, SymbolMatch};
use crate::{IngestError, InstrumentSeed, RateGate, SymbolId};

/// Maps a seed's (symbol, exchange) to the source's internal id.
#[derive(Clone)]
pub struct Resolver {
    source: Arc<dyn MarketSource>,
    gate: RateGate,
}

impl Resolver {
    pub fn new(source: Arc<dyn MarketSource>, gate: RateGate) -> Self {
        Self { source, gate }
    }

    /// One gated search call. A failed lookup is reported as `NotFound`.
    pub async fn resolve(&self, seed: &InstrumentSeed) -> Result<SymbolId, IngestError> {
        self.gate.acquire().await;

        let candidates = match self.source.search_symbols(&seed.symbol).await {
            Ok(candidates) => candidates,
            Err(error) => {
                warn!(
                    symbol = %seed.symbol,
                    exchange = %seed.exchange,
                    code = error.code(),
                    error = %error,
                    "symbol lookup failed"
                );
                return Err(IngestError::NotFound {
                    symbol: seed.symbol.clone(),
                    exchange: seed.exchange.clone(),
                    lookup: Some(error),
                });
            }
        };

        select_exact(seed, &candidates).ok_or_else(|| IngestError::NotFound {
            symbol: seed.symbol.clone(),
            exchange: seed.exchange.clone(),
            lookup: None,
        })
    }
}

/// First candidate in response order whose symbol and listing exchange both
/// equal the seed's, compared case-sensitively.
fn select_exact(seed: &InstrumentSeed, candidates: &[SymbolMatch]) -> Option<SymbolId> {
    let mut exact = candidates
        .iter()
        .filter(|c| c.symbol == seed.symbol && c.listing_exchange == seed.exchange);

    let chosen = exact.next()?;
    for ignored in exact {
        debug!(
            symbol = %seed.symbol,
            chosen = %chosen.id,
            ignored = %ignored.id,
            "duplicate exact match ignored"
        );
    }
    Some(chosen.id)
}
