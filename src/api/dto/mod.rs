pub mod repo;
pub mod run;

pub(crate) fn rfc3339(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms)
        .map(|t| t.to_rfc3339())
        .unwrap_or_default()
}
