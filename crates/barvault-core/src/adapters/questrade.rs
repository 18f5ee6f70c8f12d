use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use crate::http_client::{HttpClient, HttpRequest};
use crate::session::QuestradeSession;
use crate::source::{CandleRequest, MarketSource, SourceError, SymbolMatch};
use crate::{Bar, SymbolId, UtcDateTime};

/// Questrade REST adapter. Reads the access token and API server from the
/// session on every call, so a renewal takes effect on the next request.
#[derive(Clone)]
pub struct QuestradeAdapter {
    http_client: Arc<dyn HttpClient>,
    session: Arc<QuestradeSession>,
}

impl QuestradeAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>, session: Arc<QuestradeSession>) -> Self {
        Self {
            http_client,
            session,
        }
    }

    async fn get_json(&self, path_and_query: &str) -> Result<String, SourceError> {
        let endpoint = format!("{}{path_and_query}", self.session.api_server());
        let request = HttpRequest::get(endpoint).with_auth(&self.session.auth());

        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|error| {
                SourceError::unavailable(format!("questrade transport error: {}", error.message()))
            })?;

        match response.status {
            status if (200..300).contains(&status) => Ok(response.body),
            401 => Err(SourceError::unauthorized(
                "questrade rejected the access token (401)",
            )),
            429 => Err(SourceError::rate_limited(
                "questrade request rate exceeded (429)",
            )),
            status => Err(SourceError::unavailable(format!(
                "questrade upstream returned status {status}"
            ))),
        }
    }
}

impl MarketSource for QuestradeAdapter {
    fn search_symbols<'a>(
        &'a self,
        prefix: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<SymbolMatch>, SourceError>> + Send + 'a>> {
        Box::pin(async move {
            if prefix.trim().is_empty() {
                return Err(SourceError::invalid_request(
                    "questrade symbol search requires a prefix",
                ));
            }

            let body = self
                .get_json(&format!(
                    "v1/symbols/search?prefix={}&offset=0",
                    urlencoding::encode(prefix)
                ))
                .await?;
            let payload: SearchPayload = serde_json::from_str(&body).map_err(|error| {
                SourceError::internal(format!("failed to parse questrade search response: {error}"))
            })?;

            debug!(prefix, candidates = payload.symbols.len(), "symbol search");
            Ok(payload
                .symbols
                .into_iter()
                .map(|row| SymbolMatch::new(row.symbol, row.listing_exchange, SymbolId::new(row.symbol_id)))
                .collect())
        })
    }

    fn candles<'a>(
        &'a self,
        req: CandleRequest,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Bar>, SourceError>> + Send + 'a>> {
        Box::pin(async move {
            let body = self
                .get_json(&format!(
                    "v1/markets/candles/{}?startTime={}&endTime={}&interval=OneDay",
                    req.id,
                    urlencoding::encode(&req.start.format_rfc3339()),
                    urlencoding::encode(&req.end.format_rfc3339()),
                ))
                .await?;
            let payload: CandlesPayload = serde_json::from_str(&body).map_err(|error| {
                SourceError::internal(format!("failed to parse questrade candles response: {error}"))
            })?;

            payload
                .candles
                .into_iter()
                .map(normalize_candle)
                .collect::<Result<Vec<_>, _>>()
        })
    }
}

#[derive(Debug, Deserialize)]
struct SearchPayload {
    #[serde(default)]
    symbols: Vec<SearchRow>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchRow {
    symbol: String,
    symbol_id: i64,
    #[serde(default)]
    listing_exchange: String,
}

#[derive(Debug, Deserialize)]
struct CandlesPayload {
    #[serde(default)]
    candles: Vec<CandleRow>,
}

#[derive(Debug, Deserialize)]
struct CandleRow {
    start: String,
    end: String,
    low: f64,
    high: f64,
    open: f64,
    close: f64,
    volume: u64,
}

fn normalize_candle(row: CandleRow) -> Result<Bar, SourceError> {
    let start = UtcDateTime::parse_normalized(&row.start)
        .map_err(|error| SourceError::internal(error.to_string()))?;
    let end = UtcDateTime::parse_normalized(&row.end)
        .map_err(|error| SourceError::internal(error.to_string()))?;

    Bar::new(
        start, end, row.open, row.close, row.high, row.low, row.volume,
    )
    .map_err(|error| SourceError::internal(format!("questrade returned an invalid candle: {error}")))
}
