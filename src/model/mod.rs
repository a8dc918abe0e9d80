pub mod ai_usage;
pub mod attendance;
pub mod message;
pub mod role;
pub mod task;
pub mod user;

use chrono::{SecondsFormat, Utc};
use uuid::Uuid;

/// Random UUID v4, used for every row id.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// RFC 3339 UTC with fixed microsecond precision, so lexical order is time order.
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Calendar day (`YYYY-MM-DD`) in UTC.
pub fn today() -> String {
    Utc::now().date_naive().to_string()
}
