//! In-crate test doubles.

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use crate::source::{CandleRequest, MarketSource, SourceError, SymbolMatch};
use crate::{Bar, SymbolId, UtcDateTime};

/// Deterministic market source: a fixed listing and per-id bar series.
#[derive(Default)]
pub(crate) struct StubSource {
    listings: Vec<SymbolMatch>,
    series: BTreeMap<SymbolId, Vec<Bar>>,
    failing_searches: BTreeSet<String>,
    failing_candles: BTreeSet<SymbolId>,
    pub(crate) calls: Mutex<Vec<String>>,
}

impl StubSource {
    pub(crate) fn listing(mut self, symbol: &str, exchange: &str, id: i64) -> Self {
        self.listings
            .push(SymbolMatch::new(symbol, exchange, SymbolId::new(id)));
        self.series.entry(SymbolId::new(id)).or_insert_with(|| daily_bars(3));
        self
    }

    pub(crate) fn failing_search(mut self, prefix: &str) -> Self {
        self.failing_searches.insert(prefix.to_owned());
        self
    }

    pub(crate) fn failing_candles(mut self, id: i64) -> Self {
        self.failing_candles.insert(SymbolId::new(id));
        self
    }

    pub(crate) fn recorded_calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls").clone()
    }
}

impl MarketSource for StubSource {
    fn search_symbols<'a>(
        &'a self,
        prefix: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<SymbolMatch>, SourceError>> + Send + 'a>> {
        Box::pin(async move {
            self.calls
                .lock()
                .expect("calls")
                .push(format!("search:{prefix}"));
            if self.failing_searches.contains(prefix) {
                return Err(SourceError::unavailable("search down"));
            }
            Ok(self
                .listings
                .iter()
                .filter(|row| row.symbol.starts_with(prefix))
                .cloned()
                .collect())
        })
    }

    fn candles<'a>(
        &'a self,
        req: CandleRequest,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Bar>, SourceError>> + Send + 'a>> {
        Box::pin(async move {
            self.calls
                .lock()
                .expect("calls")
                .push(format!("candles:{}", req.id));
            if self.failing_candles.contains(&req.id) {
                return Err(SourceError::unavailable("candles down"));
            }
            Ok(self.series.get(&req.id).cloned().unwrap_or_default())
        })
    }
}

pub(crate) fn daily_bars(count: usize) -> Vec<Bar> {
    let first = UtcDateTime::parse("2024-01-02T05:00:00Z")
        .expect("ts")
        .into_inner();
    (0..count)
        .map(|day| {
            let start = first + time::Duration::days(day as i64);
            let end = start + time::Duration::days(1);
            Bar::new(
                UtcDateTime::from_offset_datetime(start).expect("utc"),
                UtcDateTime::from_offset_datetime(end).expect("utc"),
                100.0 + day as f64,
                101.0 + day as f64,
                102.0 + day as f64,
                99.0 + day as f64,
                1_000 + day as u64,
            )
            .expect("bar")
        })
        .collect()
}
