use std::fmt::{Display, Formatter};

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Duration, OffsetDateTime, UtcOffset};

use crate::ValidationError;

/// RFC3339 timestamp guaranteed to be UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UtcDateTime(OffsetDateTime);

impl UtcDateTime {
    pub fn now() -> Self {
        Self(OffsetDateTime::now_utc())
    }

    /// Parse a timestamp that must already be UTC.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let parsed = OffsetDateTime::parse(input, &Rfc3339).map_err(|_| {
            ValidationError::TimestampNotUtc {
                value: input.to_owned(),
            }
        })?;

        Self::from_offset_datetime(parsed).map_err(|_| ValidationError::TimestampNotUtc {
            value: input.to_owned(),
        })
    }

    /// Parse an RFC3339 timestamp with any offset and convert it to UTC.
    ///
    /// Upstream candles are stamped in the exchange's local offset
    /// (`2024-01-02T00:00:00.000000-05:00`).
    pub fn parse_normalized(input: &str) -> Result<Self, ValidationError> {
        let parsed = OffsetDateTime::parse(input, &Rfc3339).map_err(|_| {
            ValidationError::InvalidTimestamp {
                value: input.to_owned(),
            }
        })?;
        Ok(Self(parsed.to_offset(UtcOffset::UTC)))
    }

    pub fn from_offset_datetime(value: OffsetDateTime) -> Result<Self, ValidationError> {
        if value.offset() != UtcOffset::UTC {
            return Err(ValidationError::TimestampNotUtc {
                value: value
                    .format(&Rfc3339)
                    .unwrap_or_else(|_| String::from("<unformattable>")),
            });
        }

        Ok(Self(value))
    }

    pub fn into_inner(self) -> OffsetDateTime {
        self.0
    }

    /// The same wall-clock instant `years` calendar years earlier.
    ///
    /// February 29 maps to February 28 when the target year is not a leap year.
    pub fn years_before(self, years: u8) -> Self {
        let value = self.0;
        let year = value.year() - i32::from(years);
        let shifted = value
            .replace_year(year)
            .or_else(|_| value.replace_day(28).and_then(|value| value.replace_year(year)))
            .unwrap_or_else(|_| value - Duration::days(365 * i64::from(years)));
        Self(shifted)
    }

    pub fn format_rfc3339(self) -> String {
        self.0
            .format(&Rfc3339)
            .expect("UtcDateTime must be RFC3339 formattable")
    }

    /// `YYYY-MM-DD HH:MM:SS`, the form the warehouse casts to `TIMESTAMP`.
    pub fn format_sql(self) -> String {
        self.0
            .format(format_description!(
                "[year]-[month]-[day] [hour]:[minute]:[second]"
            ))
            .expect("UtcDateTime must be SQL formattable")
    }
}

impl Display for UtcDateTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.format_rfc3339())
    }
}

impl Serialize for UtcDateTime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.format_rfc3339())
    }
}

impl<'de> Deserialize<'de> for UtcDateTime {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_utc_timestamp() {
        let parsed = UtcDateTime::parse("2024-01-01T00:00:00Z").expect("must parse");
        assert_eq!(parsed.format_rfc3339(), "2024-01-01T00:00:00Z");
    }

    #[test]
    fn rejects_non_utc_timestamp() {
        let err = UtcDateTime::parse("2024-01-01T01:00:00+01:00").expect_err("must fail");
        assert!(matches!(err, ValidationError::TimestampNotUtc { .. }));
    }

    #[test]
    fn normalizes_exchange_local_offset() {
        let parsed =
            UtcDateTime::parse_normalized("2024-01-02T00:00:00.000000-05:00").expect("must parse");
        assert_eq!(parsed.format_sql(), "2024-01-02 05:00:00");
    }

    #[test]
    fn years_before_clamps_leap_day() {
        let leap = UtcDateTime::parse("2024-02-29T12:00:00Z").expect("must parse");
        assert_eq!(
            leap.years_before(5).format_rfc3339(),
            "2019-02-28T12:00:00Z"
        );

        let plain = UtcDateTime::parse("2026-10-18T08:30:00Z").expect("must parse");
        assert_eq!(
            plain.years_before(5).format_rfc3339(),
            "2021-10-18T08:30:00Z"
        );
    }
}
