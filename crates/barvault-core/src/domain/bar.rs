use serde::{Deserialize, Serialize};

use crate::{UtcDateTime, ValidationError};

/// One daily candlestick as delivered by the market source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub start: UtcDateTime,
    pub end: UtcDateTime,
    pub open: f64,
    pub close: f64,
    pub high: f64,
    pub low: f64,
    pub volume: u64,
}

impl Bar {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        start: UtcDateTime,
        end: UtcDateTime,
        open: f64,
        close: f64,
        high: f64,
        low: f64,
        volume: u64,
    ) -> Result<Self, ValidationError> {
        if start >= end {
            return Err(ValidationError::InvalidBarSpan);
        }

        validate_non_negative("open", open)?;
        validate_non_negative("close", close)?;
        validate_non_negative("high", high)?;
        validate_non_negative("low", low)?;

        if high < low {
            return Err(ValidationError::InvalidBarRange);
        }

        if open < low || open > high || close < low || close > high {
            return Err(ValidationError::InvalidBarBounds);
        }

        Ok(Self {
            start,
            end,
            open,
            close,
            high,
            low,
            volume,
        })
    }
}

fn validate_non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    if value < 0.0 {
        return Err(ValidationError::NegativeValue { field });
    }
    Ok(())
}
