/// Opaque job identifier (hex form of a v4 UUID).
pub type JobId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
