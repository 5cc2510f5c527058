use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category entity - groups articles for filtering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}
