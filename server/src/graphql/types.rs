use async_graphql::{Enum, ID, InputObject, SimpleObject};
use chrono::{DateTime, Utc};
use entity::kinds;
use entity::{entitlement_assignments, entitlements, grant_requests, grant_responses, revoke_requests, roles};
use platform_authz::GrantRequestDetail;
use platform_authz::model::{AccessDecision, PermissionSnapshot, ScopePermissions};
use uuid::Uuid;

fn id(value: Uuid) -> ID {
    ID::from(value.to_string())
}

#[derive(Enum, Copy, Clone, Eq, PartialEq, Debug)]
#[graphql(name = "AccessDecision")]
pub enum DecisionGql {
    Allow,
    Deny,
}

impl From<AccessDecision> for DecisionGql {
    fn from(value: AccessDecision) -> Self {
        match value {
            AccessDecision::Allow => DecisionGql::Allow,
            AccessDecision::Deny => DecisionGql::Deny,
        }
    }
}

#[derive(Enum, Copy, Clone, Eq, PartialEq, Debug)]
pub enum SubjectType {
    User,
    Group,
    Role,
    Suite,
    Custom,
}

impl From<SubjectType> for kinds::SubjectType {
    fn from(value: SubjectType) -> Self {
        match value {
            SubjectType::User => kinds::SubjectType::User,
            SubjectType::Group => kinds::SubjectType::Group,
            SubjectType::Role => kinds::SubjectType::Role,
            SubjectType::Suite => kinds::SubjectType::Suite,
            SubjectType::Custom => kinds::SubjectType::Custom,
        }
    }
}

impl From<kinds::SubjectType> for SubjectType {
    fn from(value: kinds::SubjectType) -> Self {
        match value {
            kinds::SubjectType::User => SubjectType::User,
            kinds::SubjectType::Group => SubjectType::Group,
            kinds::SubjectType::Role => SubjectType::Role,
            kinds::SubjectType::Suite => SubjectType::Suite,
            kinds::SubjectType::Custom => SubjectType::Custom,
        }
    }
}

#[derive(Enum, Copy, Clone, Eq, PartialEq, Debug)]
pub enum MemberType {
    User,
    Group,
}

impl From<MemberType> for kinds::MemberType {
    fn from(value: MemberType) -> Self {
        match value {
            MemberType::User => kinds::MemberType::User,
            MemberType::Group => kinds::MemberType::Group,
        }
    }
}

impl From<kinds::MemberType> for MemberType {
    fn from(value: kinds::MemberType) -> Self {
        match value {
            kinds::MemberType::User => MemberType::User,
            kinds::MemberType::Group => MemberType::Group,
        }
    }
}

#[derive(Enum, Copy, Clone, Eq, PartialEq, Debug)]
pub enum TargetType {
    Role,
    RoleSuite,
}

impl From<TargetType> for kinds::TargetType {
    fn from(value: TargetType) -> Self {
        match value {
            TargetType::Role => kinds::TargetType::Role,
            TargetType::RoleSuite => kinds::TargetType::RoleSuite,
        }
    }
}

impl From<kinds::TargetType> for TargetType {
    fn from(value: kinds::TargetType) -> Self {
        match value {
            kinds::TargetType::Role => TargetType::Role,
            kinds::TargetType::RoleSuite => TargetType::RoleSuite,
        }
    }
}

#[derive(Enum, Copy, Clone, Eq, PartialEq, Debug)]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl From<kinds::RequestStatus> for RequestStatus {
    fn from(value: kinds::RequestStatus) -> Self {
        match value {
            kinds::RequestStatus::Pending => RequestStatus::Pending,
            kinds::RequestStatus::Approved => RequestStatus::Approved,
            kinds::RequestStatus::Rejected => RequestStatus::Rejected,
        }
    }
}

#[derive(Enum, Copy, Clone, Eq, PartialEq, Debug)]
pub enum ResponseDecision {
    Approve,
    Deny,
}

impl From<ResponseDecision> for kinds::Decision {
    fn from(value: ResponseDecision) -> Self {
        match value {
            ResponseDecision::Approve => kinds::Decision::Approve,
            ResponseDecision::Deny => kinds::Decision::Deny,
        }
    }
}

impl From<kinds::Decision> for ResponseDecision {
    fn from(value: kinds::Decision) -> Self {
        match value {
            kinds::Decision::Approve => ResponseDecision::Approve,
            kinds::Decision::Deny => ResponseDecision::Deny,
        }
    }
}

#[derive(InputObject, Clone)]
pub struct IsAuthorizedInput {
    #[graphql(name = "actionName")]
    pub action_name: String,
    #[graphql(name = "resourceName")]
    pub resource_name: String,
    #[graphql(name = "scopeRef")]
    pub scope_ref: Option<String>,
    #[graphql(name = "subjectType")]
    pub subject_type: SubjectType,
    #[graphql(name = "subjectRef")]
    pub subject_ref: String,
}

#[derive(InputObject, Clone)]
pub struct AccessRequestInput {
    #[graphql(name = "requestorId")]
    pub requestor_id: ID,
    #[graphql(name = "receiverType", default_with = "MemberType::User")]
    pub receiver_type: MemberType,
    #[graphql(name = "receiverRef")]
    pub receiver_ref: ID,
    #[graphql(name = "targetType")]
    pub target_type: TargetType,
    #[graphql(name = "targetRef")]
    pub target_ref: ID,
    pub attachment: Option<String>,
    pub comment: Option<String>,
}

#[derive(InputObject, Clone)]
pub struct RespondInput {
    #[graphql(name = "requestId")]
    pub request_id: ID,
    pub decision: ResponseDecision,
    #[graphql(name = "responderId")]
    pub responder_id: ID,
    pub comment: Option<String>,
    pub etag: String,
}

#[derive(InputObject, Clone)]
pub struct NewEntitlementInput {
    #[graphql(name = "orgId")]
    pub org_id: ID,
    #[graphql(name = "resourceName")]
    pub resource_name: Option<String>,
    #[graphql(name = "actionName")]
    pub action_name: Option<String>,
    #[graphql(name = "scopeRef")]
    pub scope_ref: Option<String>,
}

#[derive(InputObject, Clone)]
pub struct AssignEntitlementInput {
    #[graphql(name = "entitlementId")]
    pub entitlement_id: ID,
    #[graphql(name = "subjectType")]
    pub subject_type: SubjectType,
    #[graphql(name = "subjectRef")]
    pub subject_ref: String,
    #[graphql(name = "orgId")]
    pub org_id: ID,
    #[graphql(name = "scopeRef")]
    pub scope_ref: Option<String>,
}

#[derive(InputObject, Clone)]
pub struct RoleEntitlementsInput {
    #[graphql(name = "roleId")]
    pub role_id: ID,
    #[graphql(name = "entitlementIds")]
    pub entitlement_ids: Vec<ID>,
    pub etag: String,
}

#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "ScopePermissions")]
pub struct ScopeNode {
    #[graphql(name = "scopeType")]
    pub scope_type: String,
    #[graphql(name = "scopeRef")]
    pub scope_ref: Option<String>,
    pub actions: Vec<String>,
}

impl From<ScopePermissions> for ScopeNode {
    fn from(value: ScopePermissions) -> Self {
        Self {
            scope_type: value.scope_type,
            scope_ref: value.scope_ref,
            actions: value.actions,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct ResourcePermissions {
    pub resource: String,
    pub scopes: Vec<ScopeNode>,
}

pub fn snapshot_nodes(snapshot: PermissionSnapshot) -> Vec<ResourcePermissions> {
    snapshot
        .into_iter()
        .map(|(resource, scopes)| ResourcePermissions {
            resource,
            scopes: scopes.into_iter().map(ScopeNode::from).collect(),
        })
        .collect()
}

#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "GrantResponse")]
pub struct GrantResponseNode {
    pub id: ID,
    #[graphql(name = "responderId")]
    pub responder_id: ID,
    pub decision: ResponseDecision,
    pub comment: Option<String>,
    #[graphql(name = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl From<grant_responses::Model> for GrantResponseNode {
    fn from(model: grant_responses::Model) -> Self {
        Self {
            id: id(model.id),
            responder_id: id(model.responder_id),
            decision: model.decision.into(),
            comment: model.comment,
            created_at: model.created_at.into(),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "GrantRequest")]
pub struct GrantRequestNode {
    pub id: ID,
    #[graphql(name = "requestorId")]
    pub requestor_id: ID,
    #[graphql(name = "receiverType")]
    pub receiver_type: MemberType,
    #[graphql(name = "receiverRef")]
    pub receiver_ref: ID,
    #[graphql(name = "targetType")]
    pub target_type: TargetType,
    #[graphql(name = "targetRef")]
    pub target_ref: ID,
    pub status: RequestStatus,
    #[graphql(name = "approvalId")]
    pub approval_id: Option<ID>,
    pub attachment: Option<String>,
    pub comment: Option<String>,
    pub etag: String,
    pub responses: Vec<GrantResponseNode>,
    #[graphql(name = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[graphql(name = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl From<grant_requests::Model> for GrantRequestNode {
    fn from(model: grant_requests::Model) -> Self {
        Self {
            id: id(model.id),
            requestor_id: id(model.requestor_id),
            receiver_type: model.receiver_type.into(),
            receiver_ref: id(model.receiver_ref),
            target_type: model.target_type.into(),
            target_ref: id(model.target_ref),
            status: model.status.into(),
            approval_id: model.approval_id.map(id),
            attachment: model.attachment,
            comment: model.comment,
            etag: model.etag,
            responses: Vec::new(),
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }
}

impl From<GrantRequestDetail> for GrantRequestNode {
    fn from(detail: GrantRequestDetail) -> Self {
        let mut node = GrantRequestNode::from(detail.request);
        node.responses = detail
            .responses
            .into_iter()
            .map(GrantResponseNode::from)
            .collect();
        node
    }
}

#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "RevokeRequest")]
pub struct RevokeRequestNode {
    pub id: ID,
    #[graphql(name = "requestorId")]
    pub requestor_id: ID,
    #[graphql(name = "receiverType")]
    pub receiver_type: MemberType,
    #[graphql(name = "receiverRef")]
    pub receiver_ref: ID,
    #[graphql(name = "targetType")]
    pub target_type: TargetType,
    #[graphql(name = "targetRef")]
    pub target_ref: ID,
    pub status: RequestStatus,
    pub comment: Option<String>,
    #[graphql(name = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl From<revoke_requests::Model> for RevokeRequestNode {
    fn from(model: revoke_requests::Model) -> Self {
        Self {
            id: id(model.id),
            requestor_id: id(model.requestor_id),
            receiver_type: model.receiver_type.into(),
            receiver_ref: id(model.receiver_ref),
            target_type: model.target_type.into(),
            target_ref: id(model.target_ref),
            status: model.status.into(),
            comment: model.comment,
            created_at: model.created_at.into(),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "Entitlement")]
pub struct EntitlementNode {
    pub id: ID,
    #[graphql(name = "orgId")]
    pub org_id: ID,
    #[graphql(name = "actionExpr")]
    pub action_expr: String,
    #[graphql(name = "scopeRef")]
    pub scope_ref: Option<String>,
}

impl From<entitlements::Model> for EntitlementNode {
    fn from(model: entitlements::Model) -> Self {
        Self {
            id: id(model.id),
            org_id: id(model.org_id),
            action_expr: model.action_expr,
            scope_ref: model.scope_ref,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "EntitlementAssignment")]
pub struct AssignmentNode {
    pub id: ID,
    #[graphql(name = "entitlementId")]
    pub entitlement_id: ID,
    #[graphql(name = "subjectType")]
    pub subject_type: SubjectType,
    #[graphql(name = "subjectRef")]
    pub subject_ref: String,
    #[graphql(name = "resolvedExpr")]
    pub resolved_expr: String,
    #[graphql(name = "scopeRef")]
    pub scope_ref: Option<String>,
}

impl From<entitlement_assignments::Model> for AssignmentNode {
    fn from(model: entitlement_assignments::Model) -> Self {
        Self {
            id: id(model.id),
            entitlement_id: id(model.entitlement_id),
            subject_type: model.subject_type.into(),
            subject_ref: model.subject_ref,
            resolved_expr: model.resolved_expr,
            scope_ref: model.scope_ref,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "Role")]
pub struct RoleNode {
    pub id: ID,
    pub name: String,
    #[graphql(name = "isRequestable")]
    pub is_requestable: bool,
    pub etag: String,
    #[graphql(name = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl From<roles::Model> for RoleNode {
    fn from(model: roles::Model) -> Self {
        Self {
            id: id(model.id),
            name: model.name,
            is_requestable: model.is_requestable,
            etag: model.etag,
            updated_at: model.updated_at.into(),
        }
    }
}
