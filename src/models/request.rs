use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::lifecycle::{Progress, RequestStatus};

/// A help request in the `requests` collection.
///
/// `user_name` and `org_name` are denormalized snapshots taken at creation
/// time; a later profile rename does not update them. Requester and target
/// organization never change after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelpRequest {
    pub request_id: String,
    pub user_id: String,
    pub user_name: String,
    pub org_id: String,
    pub org_name: String,
    pub help_type: String,
    pub request_text: String,
    pub status: RequestStatus,
    /// Tracked only once the request is accepted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<Progress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decline_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    /// User-reported payment reference, opaque free text for manual review.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actioned_by_org_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actioned_by_org_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actioned_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
