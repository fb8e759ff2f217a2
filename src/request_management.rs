// src/request_management.rs

use actix_web::{web, HttpRequest, HttpResponse, Responder};
use chrono::Utc;
use futures_util::StreamExt;
use log::{error, info};
use mongodb::bson::doc;
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::auth::require_account;
use crate::config::Config;
use crate::lifecycle::{
    self, Progress, RequestAction, RequestStatus, TransitionError, PAYMENT_REJECTION_REASON,
};
use crate::models::{AccountStatus, HelpRequest, Role, UserAccount};
use crate::policy::{self, Operation, OrgView, RecordKind};

// ─── REQUEST PAYLOADS ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateRequestPayload {
    pub org_id: String,
    pub help_type: String,
    pub request_text: String,
    /// Required when the payment gate is enabled.
    pub transaction_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeclineRequestPayload {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct ProgressPayload {
    pub progress: String,
}

#[derive(Debug, Deserialize)]
pub struct OrgViewQuery {
    pub view: Option<String>,
}

// ─── SUBMISSION VALIDATION ────────────────────────────────────────────────────

#[derive(Debug, Error, PartialEq)]
pub enum SubmissionError {
    #[error("a request description is required")]
    EmptyDescription,
    #[error("unknown help category")]
    UnknownCategory,
    #[error("target account is not an organization")]
    NotAnOrganization,
    #[error("target organization is not active")]
    OrganizationInactive,
    #[error("target organization does not offer this category")]
    CategoryNotOffered,
    #[error("a payment transaction reference is required")]
    MissingTransactionReference,
}

/// Guards checked before a request document is created. A failure here means
/// nothing is persisted.
pub fn validate_submission(
    request_text: &str,
    help_type: &str,
    config: &Config,
    org: &UserAccount,
    transaction_id: Option<&str>,
) -> Result<(), SubmissionError> {
    if request_text.trim().is_empty() {
        return Err(SubmissionError::EmptyDescription);
    }
    if !config.is_known_category(help_type) {
        return Err(SubmissionError::UnknownCategory);
    }
    if org.role != Role::Organization {
        return Err(SubmissionError::NotAnOrganization);
    }
    if org.status != AccountStatus::Active {
        return Err(SubmissionError::OrganizationInactive);
    }
    let offered = org
        .services
        .as_ref()
        .map(|services| services.iter().any(|s| s == help_type))
        .unwrap_or(false);
    if !offered {
        return Err(SubmissionError::CategoryNotOffered);
    }
    if config.payment_gate_enabled {
        match transaction_id {
            Some(reference) if !reference.trim().is_empty() => {}
            _ => return Err(SubmissionError::MissingTransactionReference),
        }
    }
    Ok(())
}

// ─── SHARED HELPERS ───────────────────────────────────────────────────────────

async fn fetch_request(
    data: &web::Data<AppState>,
    request_id: &str,
) -> Result<HelpRequest, HttpResponse> {
    let requests_collection = data.mongodb.db.collection::<HelpRequest>("requests");
    match requests_collection.find_one(doc! { "request_id": request_id }).await {
        Ok(Some(request)) => Ok(request),
        Ok(None) => Err(HttpResponse::NotFound().body("Request not found")),
        Err(err) => {
            error!("Error fetching request {}: {}", request_id, err);
            Err(HttpResponse::InternalServerError().body("Error fetching request"))
        }
    }
}

fn transition_error_response(err: TransitionError) -> HttpResponse {
    match err {
        TransitionError::WrongActor => {
            HttpResponse::Forbidden().body("Action not permitted for this role")
        }
        TransitionError::InvalidFromState => HttpResponse::Conflict().body(err.to_string()),
        TransitionError::MissingDeclineReason | TransitionError::MissingTransactionReference => {
            HttpResponse::BadRequest().body(err.to_string())
        }
    }
}

// ─── USER ENDPOINTS ───────────────────────────────────────────────────────────

// POST /requests
// Submits a help request against one organization and one category. The
// initial status depends on the payment-gate flag.
pub async fn create_request(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<CreateRequestPayload>,
) -> impl Responder {
    let account = match require_account(&req, &data).await {
        Ok(account) => account,
        Err(resp) => return resp,
    };
    if !policy::can(account.role, RecordKind::Request, Operation::Create) {
        return HttpResponse::Forbidden().body("Only users can submit requests");
    }

    let users_collection = data.mongodb.db.collection::<UserAccount>("users");
    let org = match users_collection.find_one(doc! { "user_id": &payload.org_id }).await {
        Ok(Some(org)) => org,
        Ok(None) => return HttpResponse::BadRequest().body("Target organization not found"),
        Err(err) => {
            error!("Error fetching organization {}: {}", payload.org_id, err);
            return HttpResponse::InternalServerError().body("Error submitting request");
        }
    };

    if let Err(err) = validate_submission(
        &payload.request_text,
        &payload.help_type,
        &data.config,
        &org,
        payload.transaction_id.as_deref(),
    ) {
        return HttpResponse::BadRequest().body(err.to_string());
    }

    let new_request = HelpRequest {
        request_id: Uuid::new_v4().to_string(),
        user_id: account.user_id.clone(),
        user_name: account.name.clone(),
        org_id: org.user_id.clone(),
        // Snapshot of the organization's display name at creation time.
        org_name: org.display_name().to_string(),
        help_type: payload.help_type.clone(),
        request_text: payload.request_text.trim().to_string(),
        status: lifecycle::initial_status(data.config.payment_gate_enabled),
        progress: None,
        decline_reason: None,
        rejection_reason: None,
        transaction_id: payload.transaction_id.clone(),
        actioned_by_org_id: None,
        actioned_by_org_name: None,
        actioned_at: None,
        created_at: Utc::now(),
    };

    let requests_collection = data.mongodb.db.collection::<HelpRequest>("requests");
    match requests_collection.insert_one(&new_request).await {
        Ok(_) => {
            info!(
                "Request created: {} ({} -> {})",
                new_request.request_id, new_request.user_id, new_request.org_id
            );
            HttpResponse::Ok().json(&new_request)
        }
        Err(err) => {
            error!("Error inserting request: {}", err);
            HttpResponse::InternalServerError().body("Error submitting request")
        }
    }
}

// GET /requests/mine
pub async fn list_my_requests(req: HttpRequest, data: web::Data<AppState>) -> impl Responder {
    let account = match require_account(&req, &data).await {
        Ok(account) => account,
        Err(resp) => return resp,
    };
    if !policy::can(account.role, RecordKind::Request, Operation::List) {
        return HttpResponse::Forbidden().body("Not permitted");
    }

    let requests_collection = data.mongodb.db.collection::<HelpRequest>("requests");
    let filter = doc! { "user_id": &account.user_id };
    let mut cursor = match requests_collection.find(filter).await {
        Ok(cursor) => cursor,
        Err(err) => {
            error!("Error fetching requests: {}", err);
            return HttpResponse::InternalServerError().body("Error fetching requests");
        }
    };

    let mut requests: Vec<HelpRequest> = Vec::new();
    while let Some(request_res) = cursor.next().await {
        match request_res {
            Ok(request) => requests.push(request),
            Err(err) => {
                error!("Error reading requests: {}", err);
                return HttpResponse::InternalServerError().body("Error reading requests");
            }
        }
    }

    // The store does not guarantee delivery order.
    requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    HttpResponse::Ok().json(requests)
}

// DELETE /requests/{request_id}
// Owner-only, and only while no organization has acted on the request.
pub async fn delete_request(
    req: HttpRequest,
    data: web::Data<AppState>,
    request_id: web::Path<String>,
) -> impl Responder {
    let account = match require_account(&req, &data).await {
        Ok(account) => account,
        Err(resp) => return resp,
    };
    if !policy::can(account.role, RecordKind::Request, Operation::Delete) {
        return HttpResponse::Forbidden().body("Not permitted");
    }

    let request = match fetch_request(&data, &request_id).await {
        Ok(request) => request,
        Err(resp) => return resp,
    };
    if request.user_id != account.user_id {
        return HttpResponse::Forbidden().body("Not permitted");
    }
    if !lifecycle::deletable_by_owner(request.status) {
        return HttpResponse::Conflict().body("Request can no longer be deleted");
    }

    let requests_collection = data.mongodb.db.collection::<HelpRequest>("requests");
    match requests_collection.delete_one(doc! { "request_id": &request.request_id }).await {
        Ok(result) => {
            if result.deleted_count == 1 {
                HttpResponse::Ok().body("Request deleted successfully")
            } else {
                HttpResponse::NotFound().body("Request not found or already deleted")
            }
        }
        Err(err) => {
            error!("Error deleting request: {}", err);
            HttpResponse::InternalServerError().body("Error deleting request")
        }
    }
}

// ─── ORGANIZATION ENDPOINTS ───────────────────────────────────────────────────

// GET /requests/org?view=pending|actioned
// Requests targeting the calling organization. The pending view is scoped to
// `status == "pending"`, so gate-held requests never appear here.
pub async fn list_org_requests(
    req: HttpRequest,
    data: web::Data<AppState>,
    query: web::Query<OrgViewQuery>,
) -> impl Responder {
    let account = match require_account(&req, &data).await {
        Ok(account) => account,
        Err(resp) => return resp,
    };
    if !policy::can(account.role, RecordKind::Request, Operation::List)
        || account.role != Role::Organization
    {
        return HttpResponse::Forbidden().body("Not permitted");
    }

    let view = match query.view.as_deref() {
        None => OrgView::Pending,
        Some(raw) => match OrgView::parse(raw) {
            Some(view) => view,
            None => return HttpResponse::BadRequest().body("Unknown view"),
        },
    };

    let requests_collection = data.mongodb.db.collection::<HelpRequest>("requests");
    let filter = policy::org_request_filter(&account.user_id, view);
    let mut cursor = match requests_collection.find(filter).await {
        Ok(cursor) => cursor,
        Err(err) => {
            error!("Error fetching requests: {}", err);
            return HttpResponse::InternalServerError().body("Error fetching requests");
        }
    };

    let mut requests: Vec<HelpRequest> = Vec::new();
    while let Some(request_res) = cursor.next().await {
        match request_res {
            Ok(request) => requests.push(request),
            Err(err) => {
                error!("Error reading requests: {}", err);
                return HttpResponse::InternalServerError().body("Error reading requests");
            }
        }
    }

    requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    HttpResponse::Ok().json(requests)
}

// POST /requests/{request_id}/accept
pub async fn accept_request(
    req: HttpRequest,
    data: web::Data<AppState>,
    request_id: web::Path<String>,
) -> impl Responder {
    let account = match require_account(&req, &data).await {
        Ok(account) => account,
        Err(resp) => return resp,
    };
    if !policy::can(account.role, RecordKind::Request, Operation::Mutate) {
        return HttpResponse::Forbidden().body("Not permitted");
    }

    let request = match fetch_request(&data, &request_id).await {
        Ok(request) => request,
        Err(resp) => return resp,
    };
    if request.org_id != account.user_id {
        return HttpResponse::Forbidden().body("Request does not target this organization");
    }

    let next = match lifecycle::transition(request.status, &RequestAction::Accept, account.role) {
        Ok(next) => next,
        Err(err) => return transition_error_response(err),
    };

    let requests_collection = data.mongodb.db.collection::<HelpRequest>("requests");
    let filter = doc! { "request_id": &request.request_id };
    let update = doc! { "$set": {
        "status": next.as_str(),
        "progress": Progress::NotStarted.as_str(),
        "actioned_by_org_id": &account.user_id,
        "actioned_by_org_name": account.display_name(),
        "actioned_at": Utc::now().to_rfc3339(),
    } };
    match requests_collection.update_one(filter, update).await {
        Ok(_) => {
            info!("Request accepted: {} by {}", request.request_id, account.user_id);
            HttpResponse::Ok().body("Request accepted")
        }
        Err(err) => {
            error!("Error accepting request: {}", err);
            HttpResponse::InternalServerError().body("Error accepting request")
        }
    }
}

// POST /requests/{request_id}/decline
pub async fn decline_request(
    req: HttpRequest,
    data: web::Data<AppState>,
    request_id: web::Path<String>,
    payload: web::Json<DeclineRequestPayload>,
) -> impl Responder {
    let account = match require_account(&req, &data).await {
        Ok(account) => account,
        Err(resp) => return resp,
    };
    if !policy::can(account.role, RecordKind::Request, Operation::Mutate) {
        return HttpResponse::Forbidden().body("Not permitted");
    }

    let request = match fetch_request(&data, &request_id).await {
        Ok(request) => request,
        Err(resp) => return resp,
    };
    if request.org_id != account.user_id {
        return HttpResponse::Forbidden().body("Request does not target this organization");
    }

    let action = RequestAction::Decline { reason: payload.reason.clone() };
    let next = match lifecycle::transition(request.status, &action, account.role) {
        Ok(next) => next,
        Err(err) => return transition_error_response(err),
    };

    let requests_collection = data.mongodb.db.collection::<HelpRequest>("requests");
    let filter = doc! { "request_id": &request.request_id };
    let update = doc! { "$set": {
        "status": next.as_str(),
        "decline_reason": payload.reason.trim(),
        "actioned_by_org_id": &account.user_id,
        "actioned_by_org_name": account.display_name(),
        "actioned_at": Utc::now().to_rfc3339(),
    } };
    match requests_collection.update_one(filter, update).await {
        Ok(_) => {
            info!("Request declined: {} by {}", request.request_id, account.user_id);
            HttpResponse::Ok().body("Request declined")
        }
        Err(err) => {
            error!("Error declining request: {}", err);
            HttpResponse::InternalServerError().body("Error declining request")
        }
    }
}

// PUT /requests/{request_id}/progress
// Progress is the only field still mutable once a request is accepted.
pub async fn update_progress(
    req: HttpRequest,
    data: web::Data<AppState>,
    request_id: web::Path<String>,
    payload: web::Json<ProgressPayload>,
) -> impl Responder {
    let account = match require_account(&req, &data).await {
        Ok(account) => account,
        Err(resp) => return resp,
    };
    if !policy::may_set(account.role, RecordKind::Request, "progress") {
        return HttpResponse::Forbidden().body("Not permitted");
    }

    let progress = match Progress::parse(&payload.progress) {
        Some(progress) => progress,
        None => return HttpResponse::BadRequest().body("Unknown progress value"),
    };

    let request = match fetch_request(&data, &request_id).await {
        Ok(request) => request,
        Err(resp) => return resp,
    };
    if request.org_id != account.user_id {
        return HttpResponse::Forbidden().body("Request does not target this organization");
    }

    if let Err(err) =
        lifecycle::transition(request.status, &RequestAction::UpdateProgress(progress), account.role)
    {
        return transition_error_response(err);
    }

    let requests_collection = data.mongodb.db.collection::<HelpRequest>("requests");
    let filter = doc! { "request_id": &request.request_id };
    let update = doc! { "$set": { "progress": progress.as_str() } };
    match requests_collection.update_one(filter, update).await {
        Ok(_) => HttpResponse::Ok().body("Progress updated"),
        Err(err) => {
            error!("Error updating progress: {}", err);
            HttpResponse::InternalServerError().body("Error updating progress")
        }
    }
}

// ─── ADMIN ENDPOINTS ──────────────────────────────────────────────────────────

// GET /requests
// Blanket audit visibility across every request.
pub async fn list_all_requests(req: HttpRequest, data: web::Data<AppState>) -> impl Responder {
    let account = match require_account(&req, &data).await {
        Ok(account) => account,
        Err(resp) => return resp,
    };
    if account.role != Role::Admin {
        return HttpResponse::Forbidden().body("Not permitted");
    }

    let requests_collection = data.mongodb.db.collection::<HelpRequest>("requests");
    let mut cursor = match requests_collection.find(doc! {}).await {
        Ok(cursor) => cursor,
        Err(err) => {
            error!("Error fetching requests: {}", err);
            return HttpResponse::InternalServerError().body("Error fetching requests");
        }
    };

    let mut requests: Vec<HelpRequest> = Vec::new();
    while let Some(request_res) = cursor.next().await {
        match request_res {
            Ok(request) => requests.push(request),
            Err(err) => {
                error!("Error reading requests: {}", err);
                return HttpResponse::InternalServerError().body("Error reading requests");
            }
        }
    }

    requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    HttpResponse::Ok().json(requests)
}

// GET /requests/payment_approvals
pub async fn list_payment_approvals(req: HttpRequest, data: web::Data<AppState>) -> impl Responder {
    let account = match require_account(&req, &data).await {
        Ok(account) => account,
        Err(resp) => return resp,
    };
    if account.role != Role::Admin {
        return HttpResponse::Forbidden().body("Not permitted");
    }

    let requests_collection = data.mongodb.db.collection::<HelpRequest>("requests");
    let filter = doc! { "status": RequestStatus::PendingPaymentApproval.as_str() };
    let mut cursor = match requests_collection.find(filter).await {
        Ok(cursor) => cursor,
        Err(err) => {
            error!("Error fetching payment approvals: {}", err);
            return HttpResponse::InternalServerError().body("Error fetching payment approvals");
        }
    };

    let mut requests: Vec<HelpRequest> = Vec::new();
    while let Some(request_res) = cursor.next().await {
        match request_res {
            Ok(request) => requests.push(request),
            Err(err) => {
                error!("Error reading payment approvals: {}", err);
                return HttpResponse::InternalServerError().body("Error reading payment approvals");
            }
        }
    }

    requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    HttpResponse::Ok().json(requests)
}

// POST /requests/{request_id}/payment/approve
// Releases a gate-held request to the target organization's pending view.
pub async fn approve_payment(
    req: HttpRequest,
    data: web::Data<AppState>,
    request_id: web::Path<String>,
) -> impl Responder {
    let account = match require_account(&req, &data).await {
        Ok(account) => account,
        Err(resp) => return resp,
    };
    if !policy::may_set(account.role, RecordKind::Request, "status") {
        return HttpResponse::Forbidden().body("Not permitted");
    }

    let request = match fetch_request(&data, &request_id).await {
        Ok(request) => request,
        Err(resp) => return resp,
    };

    let action = RequestAction::ApprovePayment { transaction_id: request.transaction_id.clone() };
    let next = match lifecycle::transition(request.status, &action, account.role) {
        Ok(next) => next,
        Err(err) => return transition_error_response(err),
    };

    let requests_collection = data.mongodb.db.collection::<HelpRequest>("requests");
    let filter = doc! { "request_id": &request.request_id };
    let update = doc! { "$set": { "status": next.as_str() } };
    match requests_collection.update_one(filter, update).await {
        Ok(_) => {
            info!("Payment approved for request {}", request.request_id);
            HttpResponse::Ok().body("Payment approved")
        }
        Err(err) => {
            error!("Error approving payment: {}", err);
            HttpResponse::InternalServerError().body("Error approving payment")
        }
    }
}

// POST /requests/{request_id}/payment/reject
pub async fn reject_payment(
    req: HttpRequest,
    data: web::Data<AppState>,
    request_id: web::Path<String>,
) -> impl Responder {
    let account = match require_account(&req, &data).await {
        Ok(account) => account,
        Err(resp) => return resp,
    };
    if !policy::may_set(account.role, RecordKind::Request, "rejection_reason") {
        return HttpResponse::Forbidden().body("Not permitted");
    }

    let request = match fetch_request(&data, &request_id).await {
        Ok(request) => request,
        Err(resp) => return resp,
    };

    let next = match lifecycle::transition(request.status, &RequestAction::RejectPayment, account.role)
    {
        Ok(next) => next,
        Err(err) => return transition_error_response(err),
    };

    let requests_collection = data.mongodb.db.collection::<HelpRequest>("requests");
    let filter = doc! { "request_id": &request.request_id };
    let update = doc! { "$set": {
        "status": next.as_str(),
        "rejection_reason": PAYMENT_REJECTION_REASON,
    } };
    match requests_collection.update_one(filter, update).await {
        Ok(_) => {
            info!("Payment rejected for request {}", request.request_id);
            HttpResponse::Ok().body("Payment rejected")
        }
        Err(err) => {
            error!("Error rejecting payment: {}", err);
            HttpResponse::InternalServerError().body("Error rejecting payment")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(gate: bool) -> Config {
        Config {
            mongo_uri: "mongodb://localhost:27017".to_string(),
            database_name: "test".to_string(),
            jwt_secret: "secret".to_string(),
            bootstrap_admin_email: "admin@example.com".to_string(),
            payment_gate_enabled: gate,
            help_categories: crate::config::DEFAULT_HELP_CATEGORIES
                .iter()
                .map(|c| c.to_string())
                .collect(),
            frontend_origin: "http://localhost:3000".to_string(),
            bind_addr: "127.0.0.1:0".to_string(),
        }
    }

    fn legal_aid_org() -> UserAccount {
        UserAccount {
            user_id: "org-1".to_string(),
            email: "contact@legalaid.example".to_string(),
            name: "Legal Aid Collective".to_string(),
            password: "hash".to_string(),
            role: Role::Organization,
            status: AccountStatus::Active,
            org_name: Some("Legal Aid Collective".to_string()),
            services: Some(vec!["Legal Advice".to_string(), "Housing Assistance".to_string()]),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn valid_submission_passes_with_gate_reference() {
        let config = test_config(true);
        let org = legal_aid_org();
        let result = validate_submission(
            "Need help with housing eviction",
            "Legal Advice",
            &config,
            &org,
            Some("TXN-2931"),
        );
        assert_eq!(result, Ok(()));
    }

    #[test]
    fn gate_disabled_needs_no_reference() {
        let config = test_config(false);
        let org = legal_aid_org();
        let result =
            validate_submission("Need help with housing eviction", "Legal Advice", &config, &org, None);
        assert_eq!(result, Ok(()));
    }

    #[test]
    fn gate_enabled_requires_a_reference() {
        let config = test_config(true);
        let org = legal_aid_org();
        assert_eq!(
            validate_submission("Need help", "Legal Advice", &config, &org, None),
            Err(SubmissionError::MissingTransactionReference)
        );
        assert_eq!(
            validate_submission("Need help", "Legal Advice", &config, &org, Some("  ")),
            Err(SubmissionError::MissingTransactionReference)
        );
    }

    #[test]
    fn empty_description_is_rejected() {
        let config = test_config(false);
        let org = legal_aid_org();
        assert_eq!(
            validate_submission("   ", "Legal Advice", &config, &org, None),
            Err(SubmissionError::EmptyDescription)
        );
    }

    #[test]
    fn unknown_category_is_rejected() {
        let config = test_config(false);
        let org = legal_aid_org();
        assert_eq!(
            validate_submission("Need help", "Tax Advice", &config, &org, None),
            Err(SubmissionError::UnknownCategory)
        );
    }

    #[test]
    fn unoffered_category_is_rejected() {
        let config = test_config(false);
        let org = legal_aid_org();
        assert_eq!(
            validate_submission("Need help", "Employment", &config, &org, None),
            Err(SubmissionError::CategoryNotOffered)
        );
    }

    #[test]
    fn inactive_organization_is_rejected() {
        let config = test_config(false);
        let mut org = legal_aid_org();
        org.status = AccountStatus::Deactivated;
        assert_eq!(
            validate_submission("Need help", "Legal Advice", &config, &org, None),
            Err(SubmissionError::OrganizationInactive)
        );
    }

    #[test]
    fn non_organization_target_is_rejected() {
        let config = test_config(false);
        let mut org = legal_aid_org();
        org.role = Role::User;
        assert_eq!(
            validate_submission("Need help", "Legal Advice", &config, &org, None),
            Err(SubmissionError::NotAnOrganization)
        );
    }
}
