/// Backend primary keys: users, widget definitions and user widgets all
/// share one id space per table.
pub type DbId = i64;

/// Cache and session timestamps, always UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
