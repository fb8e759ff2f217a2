use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestimonialStatus {
    Pending,
    Approved,
}

impl TestimonialStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestimonialStatus::Pending => "pending",
            TestimonialStatus::Approved => "approved",
        }
    }
}

/// A testimonial in the `testimonials` collection. Admin deletion acts as
/// rejection; there is no separate declined status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Testimonial {
    pub testimonial_id: String,
    pub user_id: String,
    pub user_name: String,
    pub text: String,
    pub status: TestimonialStatus,
    pub created_at: DateTime<Utc>,
}
