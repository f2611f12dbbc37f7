//! Time utilities: ledger-local timestamps.

use anyhow::Result;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;

pub const DEFAULT_TIMEZONE: &str = "Africa/Addis_Ababa";

/// Parse an IANA tz name like "Africa/Addis_Ababa".
pub fn parse_timezone(tz: &str) -> Result<Tz> {
    tz.parse()
        .map_err(|_| anyhow::anyhow!("invalid timezone: {tz}"))
}

/// Format a UTC instant as `YYYY-MM-DD HH:MM` in the ledger's timezone.
pub fn to_local_string(dt: DateTime<Utc>, tz: Tz) -> String {
    dt.with_timezone(&tz).format("%Y-%m-%d %H:%M").to_string()
}
