//! Query functions, grouped by table.
//!
//! Every function takes a plain `&Connection` so callers decide whether it
//! runs inside a transaction.

pub mod users;
pub mod videos;

pub use users::*;
pub use videos::*;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;

/// Parse an RFC 3339 column, surfacing bad data as a conversion failure.
pub(crate) fn parse_timestamp(column: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp() {
        let ts = parse_timestamp(0, "2024-03-01T12:00:00+00:00").unwrap();
        assert_eq!(ts.timestamp(), 1_709_294_400);

        assert!(matches!(
            parse_timestamp(2, "yesterday"),
            Err(rusqlite::Error::FromSqlConversionFailure(2, Type::Text, _))
        ));
    }
}
