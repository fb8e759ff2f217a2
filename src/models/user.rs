use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Account role. Immutable after creation; stored as the lowercase string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Organization,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Organization => "organization",
            Role::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Role> {
        match value {
            "user" => Some(Role::User),
            "organization" => Some(Role::Organization),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Deactivated,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Deactivated => "deactivated",
        }
    }
}

/// An account in the `users` collection. Deactivation is a soft delete: the
/// document stays, only `status` flips.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAccount {
    pub user_id: String,
    pub email: String,
    pub name: String,
    /// bcrypt hash. Never serialize this struct into a response body.
    pub password: String,
    pub role: Role,
    pub status: AccountStatus,
    /// Organizations only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org_name: Option<String>,
    /// Offered help-category labels. Organizations only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub services: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
}

impl UserAccount {
    /// The display name stamped onto records this account creates or actions.
    pub fn display_name(&self) -> &str {
        self.org_name.as_deref().unwrap_or(&self.name)
    }

    pub fn profile(&self) -> ProfileView {
        ProfileView {
            user_id: self.user_id.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
            role: self.role,
            status: self.status,
            org_name: self.org_name.clone(),
            services: self.services.clone(),
            created_at: self.created_at,
        }
    }
}

/// Client-facing projection of an account, without the credential hash.
#[derive(Debug, Serialize)]
pub struct ProfileView {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub status: AccountStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub services: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
}
