use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum GrantRequests {
    Table,
    Id,
    RequestorId,
    ReceiverType,
    ReceiverRef,
    TargetType,
    TargetRef,
    Status,
    ApprovalId,
    Attachment,
    Comment,
    Etag,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum GrantResponses {
    Table,
    Id,
    RequestId,
    ResponderId,
    Decision,
    Comment,
    CreatedAt,
}

#[derive(DeriveIden)]
enum RevokeRequests {
    Table,
    Id,
    RequestorId,
    ReceiverType,
    ReceiverRef,
    TargetType,
    TargetRef,
    Status,
    Attachment,
    Comment,
    Etag,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum PermissionHistories {
    Table,
    Id,
    Event,
    RequestId,
    ActorId,
    SubjectType,
    SubjectRef,
    TargetType,
    TargetRef,
    TargetName,
    EntitlementId,
    AssignmentId,
    ActionExpr,
    ResolvedExpr,
    CreatedAt,
}

const PENDING_GRANT_INDEX: &str = "CREATE UNIQUE INDEX IF NOT EXISTS uq_grant_requests_pending \
     ON grant_requests (receiver_type, receiver_ref, target_type, target_ref) \
     WHERE status = 'PENDING'";

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(GrantRequests::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(GrantRequests::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(GrantRequests::RequestorId).uuid().not_null())
                    .col(
                        ColumnDef::new(GrantRequests::ReceiverType)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(ColumnDef::new(GrantRequests::ReceiverRef).uuid().not_null())
                    .col(
                        ColumnDef::new(GrantRequests::TargetType)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(ColumnDef::new(GrantRequests::TargetRef).uuid().not_null())
                    .col(
                        ColumnDef::new(GrantRequests::Status)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(ColumnDef::new(GrantRequests::ApprovalId).uuid())
                    .col(ColumnDef::new(GrantRequests::Attachment).text())
                    .col(ColumnDef::new(GrantRequests::Comment).text())
                    .col(ColumnDef::new(GrantRequests::Etag).string_len(64).not_null())
                    .col(
                        ColumnDef::new(GrantRequests::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(GrantRequests::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Only one pending request per receiver and target.
        manager
            .get_connection()
            .execute_unprepared(PENDING_GRANT_INDEX)
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(GrantResponses::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(GrantResponses::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(GrantResponses::RequestId).uuid().not_null())
                    .col(ColumnDef::new(GrantResponses::ResponderId).uuid().not_null())
                    .col(
                        ColumnDef::new(GrantResponses::Decision)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(ColumnDef::new(GrantResponses::Comment).text())
                    .col(
                        ColumnDef::new(GrantResponses::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .index(
                        Index::create()
                            .name("uq_grant_responses_responder")
                            .col(GrantResponses::RequestId)
                            .col(GrantResponses::ResponderId)
                            .unique(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_grant_responses_request")
                            .from(GrantResponses::Table, GrantResponses::RequestId)
                            .to(GrantRequests::Table, GrantRequests::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(RevokeRequests::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RevokeRequests::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(RevokeRequests::RequestorId).uuid().not_null())
                    .col(
                        ColumnDef::new(RevokeRequests::ReceiverType)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(ColumnDef::new(RevokeRequests::ReceiverRef).uuid().not_null())
                    .col(
                        ColumnDef::new(RevokeRequests::TargetType)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(ColumnDef::new(RevokeRequests::TargetRef).uuid().not_null())
                    .col(
                        ColumnDef::new(RevokeRequests::Status)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(ColumnDef::new(RevokeRequests::Attachment).text())
                    .col(ColumnDef::new(RevokeRequests::Comment).text())
                    .col(ColumnDef::new(RevokeRequests::Etag).string_len(64).not_null())
                    .col(
                        ColumnDef::new(RevokeRequests::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RevokeRequests::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PermissionHistories::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PermissionHistories::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(PermissionHistories::Event)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(ColumnDef::new(PermissionHistories::RequestId).uuid())
                    .col(ColumnDef::new(PermissionHistories::ActorId).uuid().not_null())
                    .col(
                        ColumnDef::new(PermissionHistories::SubjectType)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PermissionHistories::SubjectRef)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PermissionHistories::TargetType)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(ColumnDef::new(PermissionHistories::TargetRef).uuid().not_null())
                    .col(
                        ColumnDef::new(PermissionHistories::TargetName)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PermissionHistories::EntitlementId).uuid())
                    .col(ColumnDef::new(PermissionHistories::AssignmentId).uuid())
                    .col(ColumnDef::new(PermissionHistories::ActionExpr).string())
                    .col(ColumnDef::new(PermissionHistories::ResolvedExpr).string())
                    .col(
                        ColumnDef::new(PermissionHistories::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_histories_entitlement")
                    .table(PermissionHistories::Table)
                    .col(PermissionHistories::EntitlementId)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_histories_assignment")
                    .table(PermissionHistories::Table)
                    .col(PermissionHistories::AssignmentId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(PermissionHistories::Table)
                    .if_exists()
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(RevokeRequests::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(GrantResponses::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(GrantRequests::Table).if_exists().to_owned())
            .await?;
        Ok(())
    }
}
