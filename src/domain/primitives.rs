//! Domain primitives: Symbol, PortfolioName and timestamp helpers.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Tradable instrument symbol (e.g., "ES", "AAPL").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Symbol(pub String);

impl Symbol {
    /// Create a Symbol from anything string-like.
    pub fn new(symbol: impl Into<String>) -> Self {
        Symbol(symbol.into())
    }

    /// Get the symbol as a string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Name of the portfolio owning a set of ledgers.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PortfolioName(pub String);

impl PortfolioName {
    pub fn new(name: impl Into<String>) -> Self {
        PortfolioName(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PortfolioName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Nanoseconds since the Unix epoch, as stored in the database.
///
/// Saturates at the i64 range (roughly years 1677..2262).
pub fn to_unix_nanos(ts: &DateTime<Utc>) -> i64 {
    ts.timestamp_nanos_opt().unwrap_or(if ts.timestamp() < 0 {
        i64::MIN
    } else {
        i64::MAX
    })
}

pub fn from_unix_nanos(nanos: i64) -> DateTime<Utc> {
    Utc.timestamp_nanos(nanos)
}

/// Parse an RFC 3339 timestamp or a bare `YYYY-MM-DD` date (midnight UTC).
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_display() {
        let symbol = Symbol::new("ES");
        assert_eq!(symbol.to_string(), "ES");
        assert_eq!(symbol.as_str(), "ES");
    }

    #[test]
    fn test_portfolio_name_display() {
        let name = PortfolioName::new("main");
        assert_eq!(name.to_string(), "main");
    }

    #[test]
    fn test_unix_nanos_roundtrip() {
        let ts = parse_timestamp("2024-03-01T14:30:00.000002Z").unwrap();
        assert_eq!(from_unix_nanos(to_unix_nanos(&ts)), ts);
    }

    #[test]
    fn test_parse_timestamp_accepts_bare_date() {
        let ts = parse_timestamp("1950-01-01").unwrap();
        assert_eq!(ts.to_rfc3339(), "1950-01-01T00:00:00+00:00");
        assert!(parse_timestamp("yesterday").is_none());
    }
}
