//! Database query modules.
//!
//! - tracks: track metadata CRUD
//! - plays: confirmed-play counters

pub mod plays;
pub mod tracks;

use rusqlite::types::Type;
use trackwave_common::ListenerId;

pub(crate) fn db_err(e: rusqlite::Error) -> trackwave_common::Error {
    trackwave_common::Error::database(e.to_string())
}

pub(crate) fn listener_col(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<ListenerId> {
    row.get::<_, String>(idx)?
        .parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn timestamp_col(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<chrono::DateTime<chrono::Utc>> {
    let raw: String = row.get(idx)?;
    chrono::DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
