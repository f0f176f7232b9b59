use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A callback request captured once a customer has asked for a human and
/// supplied their contact details.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRequest {
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub requested_at: DateTime<Utc>,
}
