use chrono::{DateTime, Utc};

use crate::error::StoreError;

/// Get a required column value from a row, returning CorruptRow on failure.
pub fn get<T: rusqlite::types::FromSql>(
    row: &rusqlite::Row<'_>,
    idx: usize,
    table: &'static str,
    column: &'static str,
) -> Result<T, StoreError> {
    row.get(idx).map_err(|e| StoreError::CorruptRow {
        table,
        column,
        detail: e.to_string(),
    })
}

/// Get an optional column value.
pub fn get_opt<T: rusqlite::types::FromSql>(
    row: &rusqlite::Row<'_>,
    idx: usize,
    table: &'static str,
    column: &'static str,
) -> Result<Option<T>, StoreError> {
    row.get(idx).map_err(|e| StoreError::CorruptRow {
        table,
        column,
        detail: e.to_string(),
    })
}

/// Parse a string into an enum, returning CorruptRow on failure.
pub fn parse_enum<T: std::str::FromStr>(
    raw: &str,
    table: &'static str,
    column: &'static str,
) -> Result<T, StoreError> {
    raw.parse().map_err(|_| StoreError::CorruptRow {
        table,
        column,
        detail: format!("unknown variant: {raw}"),
    })
}

/// Parse an rfc3339 TEXT column into a UTC timestamp.
pub fn parse_timestamp(
    raw: &str,
    table: &'static str,
    column: &'static str,
) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::CorruptRow {
            table,
            column,
            detail: format!("bad timestamp {raw}: {e}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lore_core::suggestion::SuggestionStatus;

    #[test]
    fn parse_enum_success() {
        let result: Result<SuggestionStatus, _> = parse_enum("pending", "suggestions", "status");
        assert_eq!(result.unwrap(), SuggestionStatus::Pending);
    }

    #[test]
    fn parse_enum_failure() {
        let result: Result<SuggestionStatus, _> = parse_enum("INVALID", "suggestions", "status");
        assert!(matches!(
            result,
            Err(StoreError::CorruptRow { table: "suggestions", column: "status", .. })
        ));
    }

    #[test]
    fn parse_timestamp_roundtrip() {
        let now = Utc::now();
        let parsed = parse_timestamp(&now.to_rfc3339(), "suggestions", "created_at").unwrap();
        assert_eq!(parsed, now);
    }

    #[test]
    fn parse_timestamp_failure() {
        let result = parse_timestamp("yesterday", "suggestions", "created_at");
        assert!(matches!(
            result,
            Err(StoreError::CorruptRow { column: "created_at", .. })
        ));
    }
}
