mod types;

use async_graphql::{Context, EmptySubscription, Error, ErrorExtensions, ID, Object, Schema, SimpleObject};
use platform_api::{ApiError, ApiResult, ClientError, FieldErrorKind, internal_error};
use platform_authz::model::{
    AssignEntitlement, CreateEntitlement, CreateGrantRequest, CreateRevokeRequest,
    IsAuthorizedQuery, RespondToGrantRequest, SetRoleEntitlements,
};
use platform_authz::{AccessEngine, ServiceError};
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

pub use types::*;

pub type SchemaType = Schema<QueryRoot, MutationRoot, EmptySubscription>;

pub fn build_schema(engine: AccessEngine) -> SchemaType {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .data(engine)
        .finish()
}

/// SDL without any schema data; resolvers are never run.
pub fn schema_sdl() -> String {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .finish()
        .sdl()
}

#[derive(Default)]
pub struct QueryRoot;

#[derive(Default)]
pub struct MutationRoot;

#[Object]
impl QueryRoot {
    #[instrument(name = "graphql.health", skip_all)]
    async fn health(&self) -> ApiResult<HealthPayload> {
        Ok(HealthPayload { ok: true })
    }

    #[instrument(name = "graphql.version", skip_all)]
    async fn version(&self) -> ApiResult<String> {
        Ok(env!("CARGO_PKG_VERSION").to_string())
    }

    #[graphql(name = "isAuthorized")]
    #[instrument(name = "graphql.is_authorized", skip_all)]
    async fn is_authorized(
        &self,
        ctx: &Context<'_>,
        input: IsAuthorizedInput,
    ) -> async_graphql::Result<DecisionGql> {
        let decision = engine(ctx)?
            .authorize
            .is_authorized(IsAuthorizedQuery {
                action_name: input.action_name,
                resource_name: input.resource_name,
                scope_ref: input.scope_ref,
                subject_type: input.subject_type.into(),
                subject_ref: input.subject_ref,
            })
            .await
            .map_err(service_error)?;
        Ok(decision.into())
    }

    #[graphql(name = "permissionSnapshot")]
    #[instrument(name = "graphql.permission_snapshot", skip_all)]
    async fn permission_snapshot(
        &self,
        ctx: &Context<'_>,
        #[graphql(name = "userId")] user_id: ID,
    ) -> async_graphql::Result<Vec<ResourcePermissions>> {
        let user_id = parse_id("userId", &user_id)?;
        let snapshot = engine(ctx)?
            .authorize
            .permission_snapshot(user_id)
            .await
            .map_err(service_error)?;
        Ok(snapshot_nodes(snapshot))
    }

    #[graphql(name = "grantRequest")]
    #[instrument(name = "graphql.grant_request", skip_all)]
    async fn grant_request(
        &self,
        ctx: &Context<'_>,
        id: ID,
    ) -> async_graphql::Result<Option<GrantRequestNode>> {
        let request_id = parse_id("id", &id)?;
        match engine(ctx)?.grants.get_grant_request(request_id).await {
            Ok(detail) => Ok(Some(detail.into())),
            Err(ServiceError::Client(err)) if err.is(FieldErrorKind::NotFound) => Ok(None),
            Err(err) => Err(service_error(err)),
        }
    }

    #[graphql(name = "revokeRequest")]
    #[instrument(name = "graphql.revoke_request", skip_all)]
    async fn revoke_request(
        &self,
        ctx: &Context<'_>,
        id: ID,
    ) -> async_graphql::Result<Option<RevokeRequestNode>> {
        let request_id = parse_id("id", &id)?;
        match engine(ctx)?.revokes.get_revoke_request(request_id).await {
            Ok(request) => Ok(Some(request.into())),
            Err(ServiceError::Client(err)) if err.is(FieldErrorKind::NotFound) => Ok(None),
            Err(err) => Err(service_error(err)),
        }
    }
}

#[Object]
impl MutationRoot {
    #[graphql(name = "createGrantRequest")]
    #[instrument(name = "graphql.create_grant_request", skip_all)]
    async fn create_grant_request(
        &self,
        ctx: &Context<'_>,
        input: AccessRequestInput,
    ) -> async_graphql::Result<GrantRequestNode> {
        let cmd = CreateGrantRequest {
            requestor_id: parse_id("requestorId", &input.requestor_id)?,
            receiver_type: input.receiver_type.into(),
            receiver_ref: parse_id("receiverRef", &input.receiver_ref)?,
            target_type: input.target_type.into(),
            target_ref: parse_id("targetRef", &input.target_ref)?,
            attachment: input.attachment,
            comment: input.comment,
        };
        let request = engine(ctx)?
            .grants
            .create_grant_request(cmd)
            .await
            .map_err(service_error)?;
        Ok(request.into())
    }

    #[graphql(name = "respondToGrantRequest")]
    #[instrument(name = "graphql.respond_to_grant_request", skip_all)]
    async fn respond_to_grant_request(
        &self,
        ctx: &Context<'_>,
        input: RespondInput,
    ) -> async_graphql::Result<GrantRequestNode> {
        let cmd = RespondToGrantRequest {
            request_id: parse_id("requestId", &input.request_id)?,
            decision: input.decision.into(),
            responder_id: parse_id("responderId", &input.responder_id)?,
            comment: input.comment,
            etag: input.etag,
        };
        let request = engine(ctx)?
            .grants
            .respond_to_grant_request(cmd)
            .await
            .map_err(service_error)?;
        Ok(request.into())
    }

    #[graphql(name = "createRevokeRequest")]
    #[instrument(name = "graphql.create_revoke_request", skip_all)]
    async fn create_revoke_request(
        &self,
        ctx: &Context<'_>,
        input: AccessRequestInput,
    ) -> async_graphql::Result<RevokeRequestNode> {
        let cmd = CreateRevokeRequest {
            requestor_id: parse_id("requestorId", &input.requestor_id)?,
            receiver_type: input.receiver_type.into(),
            receiver_ref: parse_id("receiverRef", &input.receiver_ref)?,
            target_type: input.target_type.into(),
            target_ref: parse_id("targetRef", &input.target_ref)?,
            attachment: input.attachment,
            comment: input.comment,
        };
        let request = engine(ctx)?
            .revokes
            .create_revoke_request(cmd)
            .await
            .map_err(service_error)?;
        Ok(request.into())
    }

    #[graphql(name = "createEntitlement")]
    #[instrument(name = "graphql.create_entitlement", skip_all)]
    async fn create_entitlement(
        &self,
        ctx: &Context<'_>,
        input: NewEntitlementInput,
    ) -> async_graphql::Result<EntitlementNode> {
        let cmd = CreateEntitlement {
            org_id: parse_id("orgId", &input.org_id)?,
            resource_name: input.resource_name,
            action_name: input.action_name,
            scope_ref: input.scope_ref,
        };
        let created = engine(ctx)?
            .entitlements
            .create_entitlement(cmd)
            .await
            .map_err(service_error)?;
        Ok(created.into())
    }

    #[graphql(name = "assignEntitlement")]
    #[instrument(name = "graphql.assign_entitlement", skip_all)]
    async fn assign_entitlement(
        &self,
        ctx: &Context<'_>,
        input: AssignEntitlementInput,
    ) -> async_graphql::Result<AssignmentNode> {
        let cmd = AssignEntitlement {
            entitlement_id: parse_id("entitlementId", &input.entitlement_id)?,
            subject_type: input.subject_type.into(),
            subject_ref: input.subject_ref,
            org_id: parse_id("orgId", &input.org_id)?,
            scope_ref: input.scope_ref,
        };
        let created = engine(ctx)?
            .entitlements
            .assign_entitlement(cmd)
            .await
            .map_err(service_error)?;
        Ok(created.into())
    }

    #[graphql(name = "setRoleEntitlements")]
    #[instrument(name = "graphql.set_role_entitlements", skip_all)]
    async fn set_role_entitlements(
        &self,
        ctx: &Context<'_>,
        input: RoleEntitlementsInput,
    ) -> async_graphql::Result<RoleNode> {
        let entitlement_ids = input
            .entitlement_ids
            .iter()
            .map(|id| parse_id("entitlementIds", id))
            .collect::<async_graphql::Result<Vec<Uuid>>>()?;
        let cmd = SetRoleEntitlements {
            role_id: parse_id("roleId", &input.role_id)?,
            entitlement_ids,
            etag: input.etag,
        };
        let role = engine(ctx)?
            .entitlements
            .set_role_entitlements(cmd)
            .await
            .map_err(service_error)?;
        Ok(role.into())
    }
}

#[derive(Clone, Debug, SimpleObject, Serialize)]
pub struct HealthPayload {
    pub ok: bool,
}

fn engine<'a>(ctx: &Context<'a>) -> async_graphql::Result<&'a AccessEngine> {
    ctx.data::<AccessEngine>()
        .map_err(|_| internal_error(anyhow::anyhow!("access engine missing from schema data")))
}

fn parse_id(field: &str, id: &ID) -> async_graphql::Result<Uuid> {
    Uuid::parse_str(id.as_str()).map_err(|_| {
        ApiError::from(ClientError::field(
            field,
            FieldErrorKind::Invalid,
            format!("{field} is not a valid id"),
        ))
        .extend()
    })
}

/// Client errors keep their code and fields; internal ones were logged by the service.
fn service_error(err: ServiceError) -> Error {
    match err {
        ServiceError::Client(client) => ApiError::from(client).extend(),
        internal => internal_error(internal),
    }
}
