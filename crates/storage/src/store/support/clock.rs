#![forbid(unsafe_code)]

use time::OffsetDateTime;
use time::macros::format_description;

/// Django's SQLite datetime text format, e.g. `2025-03-01 12:30:00.000000`.
pub(in crate::store) fn now_timestamp() -> String {
    let format =
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:6]");
    OffsetDateTime::now_utc()
        .format(format)
        .unwrap_or_else(|_| "1970-01-01 00:00:00.000000".to_string())
}
