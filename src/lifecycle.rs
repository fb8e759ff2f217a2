// src/lifecycle.rs
//
// The request state machine. Every status change goes through `transition`
// before any database write; a handler that gets an Err must leave the
// record untouched.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::Role;

/// Reason recorded when an admin rejects a payment. The review flow does not
/// take admin-authored rejection text.
pub const PAYMENT_REJECTION_REASON: &str = "Payment not confirmed.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    PendingPaymentApproval,
    PaymentRejected,
    Pending,
    Accepted,
    Declined,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::PendingPaymentApproval => "pending_payment_approval",
            RequestStatus::PaymentRejected => "payment_rejected",
            RequestStatus::Pending => "pending",
            RequestStatus::Accepted => "accepted",
            RequestStatus::Declined => "declined",
        }
    }
}

/// Progress marker, meaningful only once a request is accepted. The stored
/// strings keep the original label spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Progress {
    #[serde(rename = "Not Started")]
    NotStarted,
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(rename = "Completed")]
    Completed,
}

impl Progress {
    pub fn as_str(&self) -> &'static str {
        match self {
            Progress::NotStarted => "Not Started",
            Progress::InProgress => "In Progress",
            Progress::Completed => "Completed",
        }
    }

    pub fn parse(value: &str) -> Option<Progress> {
        match value {
            "Not Started" => Some(Progress::NotStarted),
            "In Progress" => Some(Progress::InProgress),
            "Completed" => Some(Progress::Completed),
            _ => None,
        }
    }
}

/// An action against an existing request. `ApprovePayment` carries the
/// transaction reference recorded on the request so the guard can check it.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestAction {
    ApprovePayment { transaction_id: Option<String> },
    RejectPayment,
    Accept,
    Decline { reason: String },
    UpdateProgress(Progress),
}

#[derive(Debug, Error, PartialEq)]
pub enum TransitionError {
    #[error("transition not permitted from the current status")]
    InvalidFromState,
    #[error("action not permitted for this role")]
    WrongActor,
    #[error("a decline reason is required")]
    MissingDeclineReason,
    #[error("request has no recorded transaction reference")]
    MissingTransactionReference,
}

/// Status assigned at submission. The payment gate is a deployment flag, not
/// a structural fork of the machine.
pub fn initial_status(payment_gate_enabled: bool) -> RequestStatus {
    if payment_gate_enabled {
        RequestStatus::PendingPaymentApproval
    } else {
        RequestStatus::Pending
    }
}

/// The role that may perform an action. Whether an organization is the
/// request's *target* organization is checked by the caller against the
/// record itself.
pub fn required_actor(action: &RequestAction) -> Role {
    match action {
        RequestAction::ApprovePayment { .. } | RequestAction::RejectPayment => Role::Admin,
        RequestAction::Accept
        | RequestAction::Decline { .. }
        | RequestAction::UpdateProgress(_) => Role::Organization,
    }
}

/// Computes the status an action leads to, or why it is refused. Progress
/// updates re-enter `Accepted`; everything else follows the single path
/// `pending_payment_approval -> pending -> accepted | declined`, with the
/// gate's reject branch ending in `payment_rejected`.
pub fn transition(
    current: RequestStatus,
    action: &RequestAction,
    actor: Role,
) -> Result<RequestStatus, TransitionError> {
    if actor != required_actor(action) {
        return Err(TransitionError::WrongActor);
    }

    match (current, action) {
        (RequestStatus::PendingPaymentApproval, RequestAction::ApprovePayment { transaction_id }) => {
            match transaction_id.as_deref() {
                Some(reference) if !reference.trim().is_empty() => Ok(RequestStatus::Pending),
                _ => Err(TransitionError::MissingTransactionReference),
            }
        }
        (RequestStatus::PendingPaymentApproval, RequestAction::RejectPayment) => {
            Ok(RequestStatus::PaymentRejected)
        }
        (RequestStatus::Pending, RequestAction::Accept) => Ok(RequestStatus::Accepted),
        (RequestStatus::Pending, RequestAction::Decline { reason }) => {
            if reason.trim().is_empty() {
                Err(TransitionError::MissingDeclineReason)
            } else {
                Ok(RequestStatus::Declined)
            }
        }
        (RequestStatus::Accepted, RequestAction::UpdateProgress(_)) => Ok(RequestStatus::Accepted),
        _ => Err(TransitionError::InvalidFromState),
    }
}

/// Once an organization has acted the request becomes an audit record the
/// owner can no longer delete.
pub fn deletable_by_owner(status: RequestStatus) -> bool {
    matches!(
        status,
        RequestStatus::PendingPaymentApproval
            | RequestStatus::PaymentRejected
            | RequestStatus::Pending
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STATUSES: [RequestStatus; 5] = [
        RequestStatus::PendingPaymentApproval,
        RequestStatus::PaymentRejected,
        RequestStatus::Pending,
        RequestStatus::Accepted,
        RequestStatus::Declined,
    ];

    fn approve(reference: &str) -> RequestAction {
        RequestAction::ApprovePayment {
            transaction_id: Some(reference.to_string()),
        }
    }

    #[test]
    fn initial_status_follows_the_gate_flag() {
        assert_eq!(initial_status(true), RequestStatus::PendingPaymentApproval);
        assert_eq!(initial_status(false), RequestStatus::Pending);
    }

    #[test]
    fn admin_approves_payment_with_reference() {
        let next = transition(
            RequestStatus::PendingPaymentApproval,
            &approve("TXN-1042"),
            Role::Admin,
        );
        assert_eq!(next, Ok(RequestStatus::Pending));
    }

    #[test]
    fn payment_approval_requires_a_reference() {
        let missing = RequestAction::ApprovePayment { transaction_id: None };
        assert_eq!(
            transition(RequestStatus::PendingPaymentApproval, &missing, Role::Admin),
            Err(TransitionError::MissingTransactionReference)
        );
        assert_eq!(
            transition(RequestStatus::PendingPaymentApproval, &approve("   "), Role::Admin),
            Err(TransitionError::MissingTransactionReference)
        );
    }

    #[test]
    fn admin_rejects_payment() {
        assert_eq!(
            transition(
                RequestStatus::PendingPaymentApproval,
                &RequestAction::RejectPayment,
                Role::Admin
            ),
            Ok(RequestStatus::PaymentRejected)
        );
    }

    #[test]
    fn organization_accepts_pending_request() {
        assert_eq!(
            transition(RequestStatus::Pending, &RequestAction::Accept, Role::Organization),
            Ok(RequestStatus::Accepted)
        );
    }

    #[test]
    fn decline_requires_a_reason() {
        let blank = RequestAction::Decline { reason: "  ".to_string() };
        assert_eq!(
            transition(RequestStatus::Pending, &blank, Role::Organization),
            Err(TransitionError::MissingDeclineReason)
        );

        let declined = RequestAction::Decline {
            reason: "Outside our service area".to_string(),
        };
        assert_eq!(
            transition(RequestStatus::Pending, &declined, Role::Organization),
            Ok(RequestStatus::Declined)
        );
    }

    #[test]
    fn progress_updates_stay_in_accepted() {
        for progress in [Progress::NotStarted, Progress::InProgress, Progress::Completed] {
            assert_eq!(
                transition(
                    RequestStatus::Accepted,
                    &RequestAction::UpdateProgress(progress),
                    Role::Organization
                ),
                Ok(RequestStatus::Accepted)
            );
        }
    }

    #[test]
    fn wrong_actor_is_refused_before_state_is_considered() {
        assert_eq!(
            transition(RequestStatus::Pending, &RequestAction::Accept, Role::User),
            Err(TransitionError::WrongActor)
        );
        assert_eq!(
            transition(RequestStatus::Pending, &RequestAction::Accept, Role::Admin),
            Err(TransitionError::WrongActor)
        );
        assert_eq!(
            transition(
                RequestStatus::PendingPaymentApproval,
                &approve("TXN-1"),
                Role::Organization
            ),
            Err(TransitionError::WrongActor)
        );
    }

    #[test]
    fn no_edges_leave_terminal_statuses() {
        let actions = [
            approve("TXN-1"),
            RequestAction::RejectPayment,
            RequestAction::Accept,
            RequestAction::Decline { reason: "no capacity".to_string() },
        ];
        for status in [RequestStatus::PaymentRejected, RequestStatus::Declined] {
            for action in &actions {
                let result = transition(status, action, required_actor(action));
                assert_eq!(result, Err(TransitionError::InvalidFromState), "{status:?} {action:?}");
            }
        }
        // Accepted admits progress updates only.
        for action in &actions {
            assert_eq!(
                transition(RequestStatus::Accepted, action, required_actor(action)),
                Err(TransitionError::InvalidFromState)
            );
        }
    }

    #[test]
    fn accept_and_decline_only_apply_to_pending() {
        for status in ALL_STATUSES {
            if status == RequestStatus::Pending {
                continue;
            }
            assert_eq!(
                transition(status, &RequestAction::Accept, Role::Organization),
                Err(TransitionError::InvalidFromState)
            );
        }
    }

    #[test]
    fn owner_delete_is_limited_to_pre_action_statuses() {
        assert!(deletable_by_owner(RequestStatus::PendingPaymentApproval));
        assert!(deletable_by_owner(RequestStatus::PaymentRejected));
        assert!(deletable_by_owner(RequestStatus::Pending));
        assert!(!deletable_by_owner(RequestStatus::Accepted));
        assert!(!deletable_by_owner(RequestStatus::Declined));
    }

    #[test]
    fn status_strings_round_trip_through_serde() {
        let encoded = serde_json::to_string(&RequestStatus::PendingPaymentApproval).unwrap();
        assert_eq!(encoded, "\"pending_payment_approval\"");
        let progress = serde_json::to_string(&Progress::NotStarted).unwrap();
        assert_eq!(progress, "\"Not Started\"");
        assert_eq!(Progress::parse("In Progress"), Some(Progress::InProgress));
        assert_eq!(Progress::parse("in progress"), None);
    }
}
