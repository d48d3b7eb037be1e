use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum Resources {
    Table,
    Id,
    OrgId,
    Name,
    ScopeType,
    Description,
    Etag,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Actions {
    Table,
    Id,
    ResourceId,
    Name,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Entitlements {
    Table,
    Id,
    OrgId,
    ActionId,
    ResourceId,
    ActionExpr,
    ScopeRef,
    CreatedAt,
}

#[derive(DeriveIden)]
enum EntitlementAssignments {
    Table,
    Id,
    EntitlementId,
    SubjectType,
    SubjectRef,
    OrgId,
    ActionName,
    ResourceName,
    ResolvedExpr,
    ScopeRef,
    SourceRoleId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Roles {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum RoleSuites {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum RoleSuiteRoles {
    Table,
    SuiteId,
    RoleId,
}

#[derive(DeriveIden)]
enum RoleMembers {
    Table,
    Id,
    RoleId,
    MemberType,
    MemberRef,
    CreatedAt,
}

#[derive(DeriveIden)]
enum RoleSuiteMembers {
    Table,
    Id,
    SuiteId,
    MemberType,
    MemberRef,
    CreatedAt,
}

/// Columns shared by `roles` and `role_suites`.
#[derive(DeriveIden)]
enum Container {
    OrgId,
    Name,
    OwnerType,
    OwnerRef,
    IsRequestable,
    IsRequiredAttachment,
    IsRequiredComment,
    Etag,
    CreatedAt,
    UpdatedAt,
}

fn container_table<T: Iden + 'static>(table: T, id: T) -> TableCreateStatement {
    Table::create()
        .table(table)
        .if_not_exists()
        .col(ColumnDef::new(id).uuid().not_null().primary_key())
        .col(ColumnDef::new(Container::OrgId).uuid().not_null())
        .col(ColumnDef::new(Container::Name).string().not_null().unique_key())
        .col(ColumnDef::new(Container::OwnerType).string_len(16).not_null())
        .col(ColumnDef::new(Container::OwnerRef).uuid())
        .col(
            ColumnDef::new(Container::IsRequestable)
                .boolean()
                .not_null()
                .default(false),
        )
        .col(
            ColumnDef::new(Container::IsRequiredAttachment)
                .boolean()
                .not_null()
                .default(false),
        )
        .col(
            ColumnDef::new(Container::IsRequiredComment)
                .boolean()
                .not_null()
                .default(false),
        )
        .col(ColumnDef::new(Container::Etag).string_len(64).not_null())
        .col(
            ColumnDef::new(Container::CreatedAt)
                .timestamp_with_time_zone()
                .not_null(),
        )
        .col(
            ColumnDef::new(Container::UpdatedAt)
                .timestamp_with_time_zone()
                .not_null(),
        )
        .to_owned()
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Resources::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Resources::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Resources::OrgId).uuid().not_null())
                    .col(
                        ColumnDef::new(Resources::Name)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Resources::ScopeType).string_len(16))
                    .col(ColumnDef::new(Resources::Description).text())
                    .col(ColumnDef::new(Resources::Etag).string_len(64).not_null())
                    .col(
                        ColumnDef::new(Resources::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Resources::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Actions::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Actions::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Actions::ResourceId).uuid().not_null())
                    .col(ColumnDef::new(Actions::Name).string().not_null())
                    .col(
                        ColumnDef::new(Actions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .index(
                        Index::create()
                            .name("uq_actions_resource_name")
                            .col(Actions::ResourceId)
                            .col(Actions::Name)
                            .unique(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_actions_resource")
                            .from(Actions::Table, Actions::ResourceId)
                            .to(Resources::Table, Resources::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Entitlements::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Entitlements::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Entitlements::OrgId).uuid().not_null())
                    .col(ColumnDef::new(Entitlements::ActionId).uuid())
                    .col(ColumnDef::new(Entitlements::ResourceId).uuid())
                    .col(
                        ColumnDef::new(Entitlements::ActionExpr)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Entitlements::ScopeRef).string())
                    .col(
                        ColumnDef::new(Entitlements::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(EntitlementAssignments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EntitlementAssignments::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(EntitlementAssignments::EntitlementId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EntitlementAssignments::SubjectType)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EntitlementAssignments::SubjectRef)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EntitlementAssignments::OrgId)
                            .uuid()
                            .not_null(),
                    )
                    .col(ColumnDef::new(EntitlementAssignments::ActionName).string())
                    .col(ColumnDef::new(EntitlementAssignments::ResourceName).string())
                    .col(
                        ColumnDef::new(EntitlementAssignments::ResolvedExpr)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(EntitlementAssignments::ScopeRef).string())
                    .col(ColumnDef::new(EntitlementAssignments::SourceRoleId).uuid())
                    .col(
                        ColumnDef::new(EntitlementAssignments::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .index(
                        Index::create()
                            .name("uq_assignments_entitlement_subject_org")
                            .col(EntitlementAssignments::EntitlementId)
                            .col(EntitlementAssignments::SubjectType)
                            .col(EntitlementAssignments::SubjectRef)
                            .col(EntitlementAssignments::OrgId)
                            .unique(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_assignments_entitlement")
                            .from(
                                EntitlementAssignments::Table,
                                EntitlementAssignments::EntitlementId,
                            )
                            .to(Entitlements::Table, Entitlements::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_assignments_subject")
                    .table(EntitlementAssignments::Table)
                    .col(EntitlementAssignments::SubjectType)
                    .col(EntitlementAssignments::SubjectRef)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(container_table(Roles::Table, Roles::Id))
            .await?;
        manager
            .create_table(container_table(RoleSuites::Table, RoleSuites::Id))
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(RoleSuiteRoles::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(RoleSuiteRoles::SuiteId).uuid().not_null())
                    .col(ColumnDef::new(RoleSuiteRoles::RoleId).uuid().not_null())
                    .primary_key(
                        Index::create()
                            .col(RoleSuiteRoles::SuiteId)
                            .col(RoleSuiteRoles::RoleId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_role_suite_roles_suite")
                            .from(RoleSuiteRoles::Table, RoleSuiteRoles::SuiteId)
                            .to(RoleSuites::Table, RoleSuites::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_role_suite_roles_role")
                            .from(RoleSuiteRoles::Table, RoleSuiteRoles::RoleId)
                            .to(Roles::Table, Roles::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(RoleMembers::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(RoleMembers::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(RoleMembers::RoleId).uuid().not_null())
                    .col(ColumnDef::new(RoleMembers::MemberType).string_len(16).not_null())
                    .col(ColumnDef::new(RoleMembers::MemberRef).uuid().not_null())
                    .col(
                        ColumnDef::new(RoleMembers::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .index(
                        Index::create()
                            .name("uq_role_members")
                            .col(RoleMembers::RoleId)
                            .col(RoleMembers::MemberType)
                            .col(RoleMembers::MemberRef)
                            .unique(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_role_members_role")
                            .from(RoleMembers::Table, RoleMembers::RoleId)
                            .to(Roles::Table, Roles::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(RoleSuiteMembers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RoleSuiteMembers::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(RoleSuiteMembers::SuiteId).uuid().not_null())
                    .col(
                        ColumnDef::new(RoleSuiteMembers::MemberType)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(ColumnDef::new(RoleSuiteMembers::MemberRef).uuid().not_null())
                    .col(
                        ColumnDef::new(RoleSuiteMembers::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .index(
                        Index::create()
                            .name("uq_role_suite_members")
                            .col(RoleSuiteMembers::SuiteId)
                            .col(RoleSuiteMembers::MemberType)
                            .col(RoleSuiteMembers::MemberRef)
                            .unique(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_role_suite_members_suite")
                            .from(RoleSuiteMembers::Table, RoleSuiteMembers::SuiteId)
                            .to(RoleSuites::Table, RoleSuites::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(RoleSuiteMembers::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(RoleMembers::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(RoleSuiteRoles::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(RoleSuites::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Roles::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(
                Table::drop()
                    .table(EntitlementAssignments::Table)
                    .if_exists()
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(Entitlements::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Actions::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Resources::Table).if_exists().to_owned())
            .await?;
        Ok(())
    }
}
