// src/user_management.rs

use actix_web::{web, HttpRequest, HttpResponse, Responder};
use bcrypt::{hash, DEFAULT_COST};
use chrono::Utc;
use futures_util::StreamExt;
use log::{error, info};
use mongodb::bson::{doc, Document};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::auth::{require_account, valid_email};
use crate::models::{AccountStatus, ProfileView, Role, UserAccount};
use crate::policy::{self, Operation, RecordKind};

#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    /// "organization" or "admin"; regular users go through self-service sign-up.
    pub role: String,
    pub services: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub services: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct RoleQuery {
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OrgQuery {
    pub category: Option<String>,
}

/// Public projection of an active organization, used by the request form.
#[derive(Debug, Serialize)]
pub struct OrgSummary {
    pub user_id: String,
    pub org_name: String,
    pub services: Vec<String>,
}

// GET /users/organizations?category=
// Active organizations, optionally narrowed to those offering a category.
pub async fn list_organizations(
    data: web::Data<AppState>,
    query: web::Query<OrgQuery>,
) -> impl Responder {
    let mut filter = doc! {
        "role": Role::Organization.as_str(),
        "status": AccountStatus::Active.as_str(),
    };
    if let Some(category) = &query.category {
        // Array membership match on the offered services.
        filter.insert("services", category.as_str());
    }

    let users_collection = data.mongodb.db.collection::<UserAccount>("users");
    let mut cursor = match users_collection.find(filter).await {
        Ok(cursor) => cursor,
        Err(err) => {
            error!("Error fetching organizations: {}", err);
            return HttpResponse::InternalServerError().body("Error fetching organizations");
        }
    };

    let mut organizations: Vec<UserAccount> = Vec::new();
    while let Some(org_res) = cursor.next().await {
        match org_res {
            Ok(org) => organizations.push(org),
            Err(err) => {
                error!("Error reading organizations: {}", err);
                return HttpResponse::InternalServerError().body("Error reading organizations");
            }
        }
    }

    organizations.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let summaries: Vec<OrgSummary> = organizations
        .iter()
        .map(|org| OrgSummary {
            user_id: org.user_id.clone(),
            org_name: org.display_name().to_string(),
            services: org.services.clone().unwrap_or_default(),
        })
        .collect();
    HttpResponse::Ok().json(summaries)
}

// GET /users?role=
pub async fn list_users(
    req: HttpRequest,
    data: web::Data<AppState>,
    query: web::Query<RoleQuery>,
) -> impl Responder {
    let account = match require_account(&req, &data).await {
        Ok(account) => account,
        Err(resp) => return resp,
    };
    if !policy::can(account.role, RecordKind::Account, Operation::List) {
        return HttpResponse::Forbidden().body("Not permitted");
    }

    let filter = match query.role.as_deref() {
        None => doc! {},
        Some(raw) => match Role::parse(raw) {
            Some(role) => doc! { "role": role.as_str() },
            None => return HttpResponse::BadRequest().body("Unknown role"),
        },
    };

    let users_collection = data.mongodb.db.collection::<UserAccount>("users");
    let mut cursor = match users_collection.find(filter).await {
        Ok(cursor) => cursor,
        Err(err) => {
            error!("Error fetching users: {}", err);
            return HttpResponse::InternalServerError().body("Error fetching users");
        }
    };

    let mut accounts: Vec<UserAccount> = Vec::new();
    while let Some(user_res) = cursor.next().await {
        match user_res {
            Ok(user) => accounts.push(user),
            Err(err) => {
                error!("Error reading users: {}", err);
                return HttpResponse::InternalServerError().body("Error reading users");
            }
        }
    }

    accounts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let profiles: Vec<ProfileView> = accounts.iter().map(|a| a.profile()).collect();
    HttpResponse::Ok().json(profiles)
}

// POST /users
// Admin-initiated creation of organization and admin accounts.
pub async fn create_account(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<CreateAccountRequest>,
) -> impl Responder {
    let account = match require_account(&req, &data).await {
        Ok(account) => account,
        Err(resp) => return resp,
    };
    if !policy::can(account.role, RecordKind::Account, Operation::Create) {
        return HttpResponse::Forbidden().body("Not permitted");
    }

    let role = match Role::parse(&payload.role) {
        Some(Role::Organization) => Role::Organization,
        Some(Role::Admin) => Role::Admin,
        _ => {
            return HttpResponse::BadRequest()
                .body("Role must be organization or admin")
        }
    };

    let name = payload.name.trim();
    let email = payload.email.trim().to_lowercase();
    if name.is_empty() {
        return HttpResponse::BadRequest().body("Name is required");
    }
    if !valid_email(&email) {
        return HttpResponse::BadRequest().body("Please enter a valid email address");
    }
    if payload.password.len() < 6 {
        return HttpResponse::BadRequest().body("Password must be at least 6 characters long");
    }

    let services = if role == Role::Organization {
        let services = payload.services.clone().unwrap_or_default();
        for service in &services {
            if !data.config.is_known_category(service) {
                return HttpResponse::BadRequest()
                    .body(format!("Unknown help category: {}", service));
            }
        }
        Some(services)
    } else {
        None
    };

    let users_collection = data.mongodb.db.collection::<UserAccount>("users");
    match users_collection.find_one(doc! { "email": &email }).await {
        Ok(Some(_)) => return HttpResponse::Conflict().body("This email address is already in use"),
        Ok(None) => {}
        Err(err) => {
            error!("Error checking for existing email: {}", err);
            return HttpResponse::InternalServerError().body("Error creating account");
        }
    }

    let hashed_password = match hash(&payload.password, DEFAULT_COST) {
        Ok(h) => h,
        Err(_) => return HttpResponse::InternalServerError().body("Error hashing password"),
    };

    let new_account = UserAccount {
        user_id: Uuid::new_v4().to_string(),
        email,
        name: name.to_string(),
        password: hashed_password,
        role,
        status: AccountStatus::Active,
        org_name: if role == Role::Organization { Some(name.to_string()) } else { None },
        services,
        created_at: Utc::now(),
    };

    match users_collection.insert_one(&new_account).await {
        Ok(_) => {
            info!(
                "{} account created by admin {}: {}",
                new_account.role.as_str(),
                account.user_id,
                new_account.user_id
            );
            HttpResponse::Ok().json(new_account.profile())
        }
        Err(err) => {
            error!("Error creating account: {}", err);
            HttpResponse::InternalServerError().body("Error creating account")
        }
    }
}

// POST /users/{user_id}/deactivate
// Soft delete: flips status only, nothing is removed. Takes effect on the
// target's next authenticated call.
pub async fn deactivate_account(
    req: HttpRequest,
    data: web::Data<AppState>,
    user_id: web::Path<String>,
) -> impl Responder {
    let account = match require_account(&req, &data).await {
        Ok(account) => account,
        Err(resp) => return resp,
    };
    if !policy::may_set(account.role, RecordKind::Account, "status") {
        return HttpResponse::Forbidden().body("Not permitted");
    }
    if *user_id == account.user_id {
        return HttpResponse::BadRequest().body("Cannot deactivate self");
    }

    let users_collection = data.mongodb.db.collection::<UserAccount>("users");
    let filter = doc! { "user_id": &*user_id };
    let update = doc! { "$set": { "status": AccountStatus::Deactivated.as_str() } };
    match users_collection.update_one(filter, update).await {
        Ok(result) => {
            if result.matched_count == 0 {
                HttpResponse::NotFound().body("Account not found")
            } else {
                info!("Account deactivated: {} by {}", user_id, account.user_id);
                HttpResponse::Ok().body("Account deactivated")
            }
        }
        Err(err) => {
            error!("Error deactivating account: {}", err);
            HttpResponse::InternalServerError().body("Error deactivating account")
        }
    }
}

// PUT /users/profile
// Field-masked profile update. Users may rename themselves; organizations may
// also update their display name and offered services.
pub async fn update_profile(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<UpdateProfileRequest>,
) -> impl Responder {
    let account = match require_account(&req, &data).await {
        Ok(account) => account,
        Err(resp) => return resp,
    };
    if !policy::can(account.role, RecordKind::Account, Operation::Mutate) {
        return HttpResponse::Forbidden().body("Not permitted");
    }

    let mut update_doc = Document::new();
    if let Some(name) = &payload.name {
        if !policy::may_set(account.role, RecordKind::Account, "name") {
            return HttpResponse::Forbidden().body("Not permitted");
        }
        let name = name.trim();
        if name.is_empty() {
            return HttpResponse::BadRequest().body("Name is required");
        }
        update_doc.insert("name", name);
        if account.role == Role::Organization {
            // Organizations present one display name; keep both in step.
            update_doc.insert("org_name", name);
        }
    }
    if let Some(services) = &payload.services {
        if !policy::may_set(account.role, RecordKind::Account, "services") {
            return HttpResponse::Forbidden().body("Not permitted");
        }
        for service in services {
            if !data.config.is_known_category(service) {
                return HttpResponse::BadRequest()
                    .body(format!("Unknown help category: {}", service));
            }
        }
        update_doc.insert("services", services.clone());
    }

    if update_doc.is_empty() {
        return HttpResponse::BadRequest().body("No fields to update");
    }

    let users_collection = data.mongodb.db.collection::<UserAccount>("users");
    let filter = doc! { "user_id": &account.user_id };
    match users_collection.update_one(filter, doc! { "$set": update_doc }).await {
        Ok(_) => HttpResponse::Ok().body("Profile updated successfully"),
        Err(err) => {
            error!("Error updating profile: {}", err);
            HttpResponse::InternalServerError().body("Error updating profile")
        }
    }
}
