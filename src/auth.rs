use actix_web::{web, HttpMessage, HttpRequest, HttpResponse, Responder};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use log::{error, info};
use mongodb::bson::doc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::models::{AccountStatus, Role, UserAccount};
use crate::policy::{self, Operation, RecordKind};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

#[derive(Debug, Deserialize)]
pub struct SignupInfo {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginInfo {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteAccountRequest {
    pub password: String,
}

// JWT Creation
pub fn create_jwt(user_id: &str, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
    let expiration = Utc::now() + Duration::hours(24);
    let claims = Claims {
        sub: user_id.to_string(),
        exp: expiration.timestamp() as usize,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_ref()))
}

// JWT Validation
pub fn validate_jwt(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$")
        .map(|re| re.is_match(email))
        .unwrap_or(false)
}

/// Resolves the authenticated actor's account from the id the middleware put
/// into request extensions. A deactivated account is refused here, so
/// deactivation takes effect on the next authenticated call even while an
/// older token is still unexpired.
pub async fn require_account(
    req: &HttpRequest,
    data: &web::Data<AppState>,
) -> Result<UserAccount, HttpResponse> {
    let user_id = match req.extensions().get::<String>() {
        Some(id) => id.clone(),
        None => return Err(HttpResponse::Unauthorized().body("Unauthorized")),
    };

    let users_collection = data.mongodb.db.collection::<UserAccount>("users");
    match users_collection.find_one(doc! { "user_id": &user_id }).await {
        Ok(Some(account)) => {
            if account.status == AccountStatus::Deactivated {
                Err(HttpResponse::Unauthorized().body("Account deactivated"))
            } else {
                Ok(account)
            }
        }
        Ok(None) => Err(HttpResponse::Unauthorized().body("Unauthorized")),
        Err(err) => {
            error!("Error resolving account {}: {}", user_id, err);
            Err(HttpResponse::InternalServerError().body("Error resolving account"))
        }
    }
}

// POST /auth/signup
// Self-service sign-up always creates a regular user; the one reserved
// bootstrap email becomes the first admin. Organization and admin accounts
// are otherwise created by an admin in user_management.
pub async fn signup(
    data: web::Data<AppState>,
    signup_info: web::Json<SignupInfo>,
) -> impl Responder {
    let name = signup_info.name.trim();
    let email = signup_info.email.trim().to_lowercase();

    if name.is_empty() {
        return HttpResponse::BadRequest().body("Name is required");
    }
    if !valid_email(&email) {
        return HttpResponse::BadRequest().body("Please enter a valid email address");
    }
    if signup_info.password.len() < 6 {
        return HttpResponse::BadRequest().body("Password must be at least 6 characters long");
    }

    let users_collection = data.mongodb.db.collection::<UserAccount>("users");
    match users_collection.find_one(doc! { "email": &email }).await {
        Ok(Some(_)) => return HttpResponse::Conflict().body("This email address is already in use"),
        Ok(None) => {}
        Err(err) => {
            error!("Error checking for existing email: {}", err);
            return HttpResponse::InternalServerError().body("Error creating account");
        }
    }

    let role = if email.eq_ignore_ascii_case(&data.config.bootstrap_admin_email) {
        Role::Admin
    } else {
        Role::User
    };

    let hashed_password = match hash(&signup_info.password, DEFAULT_COST) {
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
        org_name: None,
        services: None,
        created_at: Utc::now(),
    };

    match users_collection.insert_one(&new_account).await {
        Ok(_) => {
            info!("Account created: {} ({})", new_account.user_id, new_account.role.as_str());
            HttpResponse::Ok().json(serde_json::json!({
                "status": "Account created",
                "user_id": new_account.user_id,
            }))
        }
        Err(err) => {
            error!("Error creating account: {}", err);
            HttpResponse::InternalServerError().body("Error creating account")
        }
    }
}

// POST /auth/login
pub async fn login(data: web::Data<AppState>, login_info: web::Json<LoginInfo>) -> impl Responder {
    let email = login_info.email.trim().to_lowercase();
    let users_collection = data.mongodb.db.collection::<UserAccount>("users");

    let account = match users_collection.find_one(doc! { "email": &email }).await {
        Ok(Some(account)) => account,
        Ok(None) => return HttpResponse::Unauthorized().body("Invalid credentials"),
        Err(err) => {
            error!("Error logging in: {}", err);
            return HttpResponse::InternalServerError().body("Error logging in");
        }
    };

    if !verify(&login_info.password, &account.password).unwrap_or(false) {
        return HttpResponse::Unauthorized().body("Invalid credentials");
    }

    if account.status == AccountStatus::Deactivated {
        return HttpResponse::Forbidden().body("Account deactivated");
    }

    match create_jwt(&account.user_id, &data.config.jwt_secret) {
        Ok(token) => HttpResponse::Ok().json(serde_json::json!({
            "token": token,
            "user_id": account.user_id,
            "role": account.role.as_str(),
        })),
        Err(err) => {
            error!("Error signing token: {}", err);
            HttpResponse::InternalServerError().body("Error logging in")
        }
    }
}

// GET /auth/me
// Returns the caller's profile; a deactivated account gets 401 here, which is
// the client's signal to drop the session.
pub async fn me(req: HttpRequest, data: web::Data<AppState>) -> impl Responder {
    match require_account(&req, &data).await {
        Ok(account) => HttpResponse::Ok().json(account.profile()),
        Err(resp) => resp,
    }
}

// PUT /auth/password
// Requires re-authentication with the current password.
pub async fn change_password(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<ChangePasswordRequest>,
) -> impl Responder {
    let account = match require_account(&req, &data).await {
        Ok(account) => account,
        Err(resp) => return resp,
    };
    if !policy::may_set(account.role, RecordKind::Account, "password") {
        return HttpResponse::Forbidden().body("Not permitted");
    }

    if !verify(&payload.current_password, &account.password).unwrap_or(false) {
        return HttpResponse::Unauthorized().body("Current password is incorrect");
    }
    if payload.new_password.len() < 6 {
        return HttpResponse::BadRequest().body("Password must be at least 6 characters long");
    }

    let hashed_password = match hash(&payload.new_password, DEFAULT_COST) {
        Ok(h) => h,
        Err(_) => return HttpResponse::InternalServerError().body("Error hashing password"),
    };

    let users_collection = data.mongodb.db.collection::<UserAccount>("users");
    let filter = doc! { "user_id": &account.user_id };
    let update = doc! { "$set": { "password": hashed_password } };
    match users_collection.update_one(filter, update).await {
        Ok(_) => HttpResponse::Ok().body("Password updated successfully"),
        Err(err) => {
            error!("Error updating password: {}", err);
            HttpResponse::InternalServerError().body("Error updating password")
        }
    }
}

// DELETE /auth/account
// Self-service account deletion removes the profile document (credential
// included) after re-authentication. Historical requests, testimonials and
// donations are left in place.
pub async fn delete_account(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<DeleteAccountRequest>,
) -> impl Responder {
    let account = match require_account(&req, &data).await {
        Ok(account) => account,
        Err(resp) => return resp,
    };
    if !policy::can(account.role, RecordKind::Account, Operation::Delete) {
        return HttpResponse::Forbidden().body("Not permitted");
    }

    if !verify(&payload.password, &account.password).unwrap_or(false) {
        return HttpResponse::Unauthorized().body("Password is incorrect");
    }

    let users_collection = data.mongodb.db.collection::<UserAccount>("users");
    match users_collection.delete_one(doc! { "user_id": &account.user_id }).await {
        Ok(result) => {
            if result.deleted_count == 1 {
                info!("Account deleted: {}", account.user_id);
                HttpResponse::Ok().body("Account deleted")
            } else {
                HttpResponse::NotFound().body("Account not found")
            }
        }
        Err(err) => {
            error!("Error deleting account: {}", err);
            HttpResponse::InternalServerError().body("Error deleting account")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shape_check() {
        assert!(valid_email("someone@example.com"));
        assert!(valid_email("a.b+c@sub.domain.org"));
        assert!(!valid_email("not-an-email"));
        assert!(!valid_email("missing@tld"));
        assert!(!valid_email("spaces in@example.com"));
    }

    #[test]
    fn jwt_round_trip() {
        let token = create_jwt("user-1", "test-secret").unwrap();
        let claims = validate_jwt(&token, "test-secret").unwrap();
        assert_eq!(claims.sub, "user-1");
        assert!(validate_jwt(&token, "other-secret").is_err());
    }
}
