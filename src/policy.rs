// src/policy.rs
//
// The role-scoped capability table. Every handler consults this before
// building a read filter or issuing a mutation, so the role rules live in
// one place instead of scattered per-endpoint conditionals.

use mongodb::bson::{doc, Document};

use crate::lifecycle::RequestStatus;
use crate::models::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Request,
    Testimonial,
    Account,
    Donation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    List,
    Mutate,
    Delete,
}

/// Which records of a kind the role may see or touch. The record-level check
/// (is this *my* request, does this request *target me*) is applied by the
/// handler against the fetched document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Own,
    TargetingSelf,
    All,
}

#[derive(Debug, Clone, Copy)]
pub struct Capability {
    pub scope: Scope,
    /// Fields the role may set on this kind. Empty for non-mutating grants.
    pub fields: &'static [&'static str],
}

const ORG_REQUEST_FIELDS: &[&str] = &[
    "status",
    "progress",
    "decline_reason",
    "actioned_by_org_id",
    "actioned_by_org_name",
    "actioned_at",
];

// Admin may gate payments but never touch requester-authored content.
const ADMIN_REQUEST_FIELDS: &[&str] = &["status", "rejection_reason"];

const USER_ACCOUNT_FIELDS: &[&str] = &["name", "password"];
const ORG_ACCOUNT_FIELDS: &[&str] = &["name", "org_name", "services", "password"];
const ADMIN_ACCOUNT_FIELDS: &[&str] = &["status", "password"];

/// The capability matrix. `None` is a deny. Donation creation is public and
/// sessionless, so it does not appear here; donation reads are admin-only.
pub fn capability(role: Role, kind: RecordKind, op: Operation) -> Option<Capability> {
    use Operation::*;
    use RecordKind::*;
    use Role::*;

    let grant = |scope, fields| Some(Capability { scope, fields });

    match (role, kind, op) {
        (User, Request, Create) => grant(Scope::Own, &[]),
        (User, Request, List) => grant(Scope::Own, &[]),
        (User, Request, Delete) => grant(Scope::Own, &[]),

        (User, Testimonial, Create) => grant(Scope::Own, &[]),
        (User, Testimonial, List) => grant(Scope::Own, &[]),
        (User, Testimonial, Delete) => grant(Scope::Own, &[]),

        (User, Account, Mutate) => grant(Scope::Own, USER_ACCOUNT_FIELDS),
        (User, Account, Delete) => grant(Scope::Own, &[]),

        (Organization, Request, List) => grant(Scope::TargetingSelf, &[]),
        (Organization, Request, Mutate) => grant(Scope::TargetingSelf, ORG_REQUEST_FIELDS),

        (Organization, Account, Mutate) => grant(Scope::Own, ORG_ACCOUNT_FIELDS),

        (Admin, Request, List) => grant(Scope::All, &[]),
        (Admin, Request, Mutate) => grant(Scope::All, ADMIN_REQUEST_FIELDS),

        (Admin, Testimonial, List) => grant(Scope::All, &[]),
        (Admin, Testimonial, Mutate) => grant(Scope::All, &["status"]),
        (Admin, Testimonial, Delete) => grant(Scope::All, &[]),

        (Admin, Account, List) => grant(Scope::All, &[]),
        (Admin, Account, Create) => grant(Scope::All, &[]),
        (Admin, Account, Mutate) => grant(Scope::All, ADMIN_ACCOUNT_FIELDS),

        (Admin, Donation, List) => grant(Scope::All, &[]),

        _ => None,
    }
}

pub fn can(role: Role, kind: RecordKind, op: Operation) -> bool {
    capability(role, kind, op).is_some()
}

pub fn may_set(role: Role, kind: RecordKind, field: &str) -> bool {
    capability(role, kind, Operation::Mutate)
        .map(|cap| cap.fields.contains(&field))
        .unwrap_or(false)
}

/// The two request views an organization dashboard shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrgView {
    Pending,
    Actioned,
}

impl OrgView {
    pub fn parse(value: &str) -> Option<OrgView> {
        match value {
            "pending" => Some(OrgView::Pending),
            "actioned" => Some(OrgView::Actioned),
            _ => None,
        }
    }
}

/// Read filter for an organization's request list. The pending view is pinned
/// to `status == "pending"`: requests held at the payment gate (or rejected
/// there) must never reach an organization.
pub fn org_request_filter(org_id: &str, view: OrgView) -> Document {
    match view {
        OrgView::Pending => doc! {
            "org_id": org_id,
            "status": RequestStatus::Pending.as_str(),
        },
        OrgView::Actioned => doc! {
            "org_id": org_id,
            "status": { "$in": [
                RequestStatus::Accepted.as_str(),
                RequestStatus::Declined.as_str(),
            ] },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn users_only_reach_their_own_records() {
        let requests = capability(Role::User, RecordKind::Request, Operation::List).unwrap();
        assert_eq!(requests.scope, Scope::Own);
        let testimonials =
            capability(Role::User, RecordKind::Testimonial, Operation::List).unwrap();
        assert_eq!(testimonials.scope, Scope::Own);
    }

    #[test]
    fn users_cannot_mutate_requests_directly() {
        assert!(!can(Role::User, RecordKind::Request, Operation::Mutate));
    }

    #[test]
    fn organizations_have_no_testimonial_access() {
        for op in [Operation::Create, Operation::List, Operation::Mutate, Operation::Delete] {
            assert!(!can(Role::Organization, RecordKind::Testimonial, op));
        }
    }

    #[test]
    fn organizations_cannot_create_or_delete_requests() {
        assert!(!can(Role::Organization, RecordKind::Request, Operation::Create));
        assert!(!can(Role::Organization, RecordKind::Request, Operation::Delete));
    }

    #[test]
    fn organization_request_scope_targets_self() {
        let cap = capability(Role::Organization, RecordKind::Request, Operation::Mutate).unwrap();
        assert_eq!(cap.scope, Scope::TargetingSelf);
        assert!(cap.fields.contains(&"progress"));
        assert!(cap.fields.contains(&"decline_reason"));
        assert!(!cap.fields.contains(&"request_text"));
    }

    #[test]
    fn admin_request_mask_excludes_requester_authored_fields() {
        assert!(may_set(Role::Admin, RecordKind::Request, "status"));
        assert!(may_set(Role::Admin, RecordKind::Request, "rejection_reason"));
        assert!(!may_set(Role::Admin, RecordKind::Request, "request_text"));
        assert!(!may_set(Role::Admin, RecordKind::Request, "help_type"));
        assert!(!may_set(Role::Admin, RecordKind::Request, "progress"));
    }

    #[test]
    fn only_admin_reads_donations() {
        assert!(can(Role::Admin, RecordKind::Donation, Operation::List));
        assert!(!can(Role::User, RecordKind::Donation, Operation::List));
        assert!(!can(Role::Organization, RecordKind::Donation, Operation::List));
    }

    #[test]
    fn profile_field_masks_differ_by_role() {
        assert!(may_set(Role::User, RecordKind::Account, "name"));
        assert!(!may_set(Role::User, RecordKind::Account, "services"));
        assert!(may_set(Role::Organization, RecordKind::Account, "services"));
        assert!(may_set(Role::Organization, RecordKind::Account, "org_name"));
        assert!(!may_set(Role::User, RecordKind::Account, "role"));
        assert!(!may_set(Role::Admin, RecordKind::Account, "role"));
    }

    #[test]
    fn pending_view_never_admits_gate_statuses() {
        let filter = org_request_filter("org-1", OrgView::Pending);
        assert_eq!(filter.get_str("status").unwrap(), "pending");
        assert_eq!(filter.get_str("org_id").unwrap(), "org-1");
    }

    #[test]
    fn actioned_view_covers_accepted_and_declined_only() {
        let filter = org_request_filter("org-1", OrgView::Actioned);
        let statuses = filter
            .get_document("status")
            .unwrap()
            .get_array("$in")
            .unwrap();
        let statuses: Vec<&str> = statuses.iter().map(|s| s.as_str().unwrap()).collect();
        assert_eq!(statuses, vec!["accepted", "declined"]);
    }

    #[test]
    fn view_parsing_accepts_the_two_dashboard_views() {
        assert_eq!(OrgView::parse("pending"), Some(OrgView::Pending));
        assert_eq!(OrgView::parse("actioned"), Some(OrgView::Actioned));
        assert_eq!(OrgView::parse("all"), None);
    }
}
