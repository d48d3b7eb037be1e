//! Queries, commands and read models of the access engine.

use std::collections::BTreeMap;
use std::fmt;

use entity::kinds::{Decision, MemberType, SubjectType, TargetType};
use entity::{actions, entitlement_assignments, entitlements, resources, role_suites, roles};
use serde::Serialize;
use uuid::Uuid;

/// Boundary within which an entitlement applies.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum ScopeType {
    Domain,
    Org,
    Hierarchy,
    Private,
    Other(String),
}

impl ScopeType {
    /// Unset or blank columns mean domain-wide.
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
            return ScopeType::Domain;
        };
        match raw.to_ascii_lowercase().as_str() {
            "domain" => ScopeType::Domain,
            "org" => ScopeType::Org,
            "hierarchy" => ScopeType::Hierarchy,
            "private" => ScopeType::Private,
            _ => ScopeType::Other(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ScopeType::Domain => "domain",
            ScopeType::Org => "org",
            ScopeType::Hierarchy => "hierarchy",
            ScopeType::Private => "private",
            ScopeType::Other(raw) => raw,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, ScopeType::Other(_))
    }
}

impl fmt::Display for ScopeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Actor being evaluated or receiving access.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Subject {
    pub subject_type: SubjectType,
    pub subject_ref: String,
}

impl Subject {
    pub fn new(subject_type: SubjectType, subject_ref: impl Into<String>) -> Self {
        Self {
            subject_type,
            subject_ref: subject_ref.into(),
        }
    }

    pub fn member(member_type: MemberType, member_ref: Uuid) -> Self {
        Self::new(member_type.into(), member_ref.to_string())
    }
}

/// An assignment joined with the entitlement, resource and action it points at.
#[derive(Clone, Debug, PartialEq)]
pub struct AssignmentView {
    pub assignment: entitlement_assignments::Model,
    pub entitlement: Option<entitlements::Model>,
    pub resource: Option<resources::Model>,
    pub action: Option<actions::Model>,
}

impl AssignmentView {
    pub fn resource_scope(&self) -> ScopeType {
        ScopeType::parse(self.resource.as_ref().and_then(|r| r.scope_type.as_deref()))
    }

    /// The assignment's own scope_ref overrides the entitlement's.
    pub fn effective_scope_ref(&self) -> Option<&str> {
        self.assignment
            .scope_ref
            .as_deref()
            .or_else(|| self.entitlement.as_ref().and_then(|e| e.scope_ref.as_deref()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IsAuthorizedQuery {
    pub action_name: String,
    pub resource_name: String,
    pub scope_ref: Option<String>,
    pub subject_type: SubjectType,
    pub subject_ref: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessDecision {
    Allow,
    Deny,
}

impl AccessDecision {
    pub fn is_allowed(self) -> bool {
        matches!(self, AccessDecision::Allow)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ScopePermissions {
    pub scope_type: String,
    pub scope_ref: Option<String>,
    pub actions: Vec<String>,
}

/// Resource name to the scopes and actions granted within it.
pub type PermissionSnapshot = BTreeMap<String, Vec<ScopePermissions>>;

/// A role or role suite, the two things a grant request can target.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Target {
    pub target_type: TargetType,
    pub id: Uuid,
    pub org_id: Uuid,
    pub name: String,
    pub owner_type: MemberType,
    pub owner_ref: Option<Uuid>,
    pub is_requestable: bool,
    pub is_required_attachment: bool,
    pub is_required_comment: bool,
    pub etag: String,
}

impl Target {
    /// Subject under which the target's own entitlements are assigned.
    pub fn subject(&self) -> Subject {
        let subject_type = match self.target_type {
            TargetType::Role => SubjectType::Role,
            TargetType::RoleSuite => SubjectType::Suite,
        };
        Subject::new(subject_type, self.id.to_string())
    }
}

impl From<roles::Model> for Target {
    fn from(model: roles::Model) -> Self {
        Self {
            target_type: TargetType::Role,
            id: model.id,
            org_id: model.org_id,
            name: model.name,
            owner_type: model.owner_type,
            owner_ref: model.owner_ref,
            is_requestable: model.is_requestable,
            is_required_attachment: model.is_required_attachment,
            is_required_comment: model.is_required_comment,
            etag: model.etag,
        }
    }
}

impl From<role_suites::Model> for Target {
    fn from(model: role_suites::Model) -> Self {
        Self {
            target_type: TargetType::RoleSuite,
            id: model.id,
            org_id: model.org_id,
            name: model.name,
            owner_type: model.owner_type,
            owner_ref: model.owner_ref,
            is_requestable: model.is_requestable,
            is_required_attachment: model.is_required_attachment,
            is_required_comment: model.is_required_comment,
            etag: model.etag,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateGrantRequest {
    pub requestor_id: Uuid,
    pub receiver_type: MemberType,
    pub receiver_ref: Uuid,
    pub target_type: TargetType,
    pub target_ref: Uuid,
    pub attachment: Option<String>,
    pub comment: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RespondToGrantRequest {
    pub request_id: Uuid,
    pub decision: Decision,
    pub responder_id: Uuid,
    pub comment: Option<String>,
    pub etag: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateRevokeRequest {
    pub requestor_id: Uuid,
    pub receiver_type: MemberType,
    pub receiver_ref: Uuid,
    pub target_type: TargetType,
    pub target_ref: Uuid,
    pub attachment: Option<String>,
    pub comment: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateEntitlement {
    pub org_id: Uuid,
    pub resource_name: Option<String>,
    pub action_name: Option<String>,
    pub scope_ref: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssignEntitlement {
    pub entitlement_id: Uuid,
    pub subject_type: SubjectType,
    pub subject_ref: String,
    pub org_id: Uuid,
    /// Overrides the entitlement's own scope reference.
    pub scope_ref: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SetRoleEntitlements {
    pub role_id: Uuid,
    pub entitlement_ids: Vec<Uuid>,
    pub etag: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpdateResource {
    pub resource_id: Uuid,
    pub scope_type: Option<String>,
    pub description: Option<String>,
    pub etag: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_type_parsing() {
        assert_eq!(ScopeType::parse(None), ScopeType::Domain);
        assert_eq!(ScopeType::parse(Some("  ")), ScopeType::Domain);
        assert_eq!(ScopeType::parse(Some("ORG")), ScopeType::Org);
        assert_eq!(ScopeType::parse(Some("hierarchy")), ScopeType::Hierarchy);
        assert_eq!(
            ScopeType::parse(Some("galaxy")),
            ScopeType::Other("galaxy".into())
        );
        assert!(!ScopeType::parse(Some("galaxy")).is_known());
    }
}
