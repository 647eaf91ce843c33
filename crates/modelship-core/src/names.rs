//! Resource names. Job, model and endpoint names must be unique per account
//! and region, so runbook-created names carry a UTC timestamp suffix.

use chrono::{DateTime, Utc};

/// Longest name the control plane accepts.
pub const MAX_NAME_LEN: usize = 63;

/// `prefix-YYYY-MM-DD-HH-MM-SS` for the current time.
pub fn unique_name(prefix: &str) -> String {
    name_at(prefix, Utc::now())
}

/// `prefix-YYYY-MM-DD-HH-MM-SS` for a given instant.
pub fn name_at(prefix: &str, at: DateTime<Utc>) -> String {
    let stamp = at.format("%Y-%m-%d-%H-%M-%S").to_string();
    let mut prefix: String = prefix
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
        .collect();
    prefix.truncate(MAX_NAME_LEN - stamp.len() - 1);
    let prefix = prefix.trim_matches('-');
    if prefix.is_empty() {
        stamp
    } else {
        format!("{}-{}", prefix, stamp)
    }
}
