use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A donation in the `donations` collection. Created by anyone without a
/// session, never mutated or deleted, read only by admin views.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Donation {
    pub donation_id: String,
    pub amount: f64,
    pub donor_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub donor_email: Option<String>,
    pub donated_at: DateTime<Utc>,
}
