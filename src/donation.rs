// src/donation.rs

use actix_web::{web, HttpRequest, HttpResponse, Responder};
use chrono::Utc;
use futures_util::StreamExt;
use log::{error, info};
use mongodb::bson::doc;
use serde::Deserialize;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::auth::require_account;
use crate::policy::{self, Operation, RecordKind};
use crate::models::Donation;

#[derive(Debug, Deserialize)]
pub struct CreateDonationPayload {
    pub amount: f64,
    pub donor_name: Option<String>,
    pub donor_email: Option<String>,
}

/// Donor name stored when none is given.
pub const ANONYMOUS_DONOR: &str = "Anonymous";

pub fn normalize_donor_name(donor_name: Option<&str>) -> String {
    match donor_name {
        Some(name) if !name.trim().is_empty() => name.trim().to_string(),
        _ => ANONYMOUS_DONOR.to_string(),
    }
}

pub fn valid_amount(amount: f64) -> bool {
    amount.is_finite() && amount > 0.0
}

// POST /donations
// Public and sessionless; donations are never attributable to an account.
pub async fn create_donation(
    data: web::Data<AppState>,
    payload: web::Json<CreateDonationPayload>,
) -> impl Responder {
    if !valid_amount(payload.amount) {
        return HttpResponse::BadRequest().body("Please enter a valid amount");
    }

    let new_donation = Donation {
        donation_id: Uuid::new_v4().to_string(),
        amount: payload.amount,
        donor_name: normalize_donor_name(payload.donor_name.as_deref()),
        donor_email: payload
            .donor_email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_string),
        donated_at: Utc::now(),
    };

    let donations_collection = data.mongodb.db.collection::<Donation>("donations");
    match donations_collection.insert_one(&new_donation).await {
        Ok(_) => {
            info!("Donation recorded: {}", new_donation.donation_id);
            HttpResponse::Ok().json(&new_donation)
        }
        Err(err) => {
            error!("Error recording donation: {}", err);
            HttpResponse::InternalServerError().body("Donation failed. Please try again.")
        }
    }
}

// GET /donations
pub async fn list_donations(req: HttpRequest, data: web::Data<AppState>) -> impl Responder {
    let account = match require_account(&req, &data).await {
        Ok(account) => account,
        Err(resp) => return resp,
    };
    if !policy::can(account.role, RecordKind::Donation, Operation::List) {
        return HttpResponse::Forbidden().body("Not permitted");
    }

    let donations_collection = data.mongodb.db.collection::<Donation>("donations");
    let mut cursor = match donations_collection.find(doc! {}).await {
        Ok(cursor) => cursor,
        Err(err) => {
            error!("Error fetching donations: {}", err);
            return HttpResponse::InternalServerError().body("Error fetching donations");
        }
    };

    let mut donations: Vec<Donation> = Vec::new();
    while let Some(donation_res) = cursor.next().await {
        match donation_res {
            Ok(donation) => donations.push(donation),
            Err(err) => {
                error!("Error reading donations: {}", err);
                return HttpResponse::InternalServerError().body("Error reading donations");
            }
        }
    }

    donations.sort_by(|a, b| b.donated_at.cmp(&a.donated_at));
    HttpResponse::Ok().json(donations)
}

// GET /donations/summary
// Aggregate view for the admin dashboard.
pub async fn donation_summary(req: HttpRequest, data: web::Data<AppState>) -> impl Responder {
    let account = match require_account(&req, &data).await {
        Ok(account) => account,
        Err(resp) => return resp,
    };
    if !policy::can(account.role, RecordKind::Donation, Operation::List) {
        return HttpResponse::Forbidden().body("Not permitted");
    }

    let donations_collection = data.mongodb.db.collection::<Donation>("donations");
    let mut cursor = match donations_collection.find(doc! {}).await {
        Ok(cursor) => cursor,
        Err(err) => {
            error!("Error fetching donations: {}", err);
            return HttpResponse::InternalServerError().body("Error fetching donations");
        }
    };

    let mut total_amount = 0.0_f64;
    let mut total_donations = 0_u64;
    while let Some(donation_res) = cursor.next().await {
        match donation_res {
            Ok(donation) => {
                total_amount += donation.amount;
                total_donations += 1;
            }
            Err(err) => {
                error!("Error reading donations: {}", err);
                return HttpResponse::InternalServerError().body("Error reading donations");
            }
        }
    }

    HttpResponse::Ok().json(serde_json::json!({
        "total_amount": total_amount,
        "total_donations": total_donations,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_or_blank_donor_becomes_anonymous() {
        assert_eq!(normalize_donor_name(None), "Anonymous");
        assert_eq!(normalize_donor_name(Some("   ")), "Anonymous");
        assert_eq!(normalize_donor_name(Some(" Alex Doe ")), "Alex Doe");
    }

    #[test]
    fn amount_must_be_positive_and_finite() {
        assert!(valid_amount(250.0));
        assert!(valid_amount(0.01));
        assert!(!valid_amount(0.0));
        assert!(!valid_amount(-5.0));
        assert!(!valid_amount(f64::NAN));
        assert!(!valid_amount(f64::INFINITY));
    }
}
