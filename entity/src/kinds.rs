use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Who an entitlement assignment is bound to.
#[derive(
    Copy, Clone, Debug, EnumIter, DeriveActiveEnum, Eq, PartialEq, Hash, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
pub enum SubjectType {
    #[sea_orm(string_value = "USER")]
    User,
    #[sea_orm(string_value = "GROUP")]
    Group,
    #[sea_orm(string_value = "ROLE")]
    Role,
    #[sea_orm(string_value = "SUITE")]
    Suite,
    #[sea_orm(string_value = "CUSTOM")]
    Custom,
}

/// Principals that can own a role or hold a membership.
#[derive(
    Copy, Clone, Debug, EnumIter, DeriveActiveEnum, Eq, PartialEq, Hash, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
pub enum MemberType {
    #[sea_orm(string_value = "USER")]
    User,
    #[sea_orm(string_value = "GROUP")]
    Group,
}

impl From<MemberType> for SubjectType {
    fn from(value: MemberType) -> Self {
        match value {
            MemberType::User => SubjectType::User,
            MemberType::Group => SubjectType::Group,
        }
    }
}

#[derive(
    Copy, Clone, Debug, EnumIter, DeriveActiveEnum, Eq, PartialEq, Hash, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
pub enum TargetType {
    #[sea_orm(string_value = "ROLE")]
    Role,
    #[sea_orm(string_value = "ROLE_SUITE")]
    RoleSuite,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveActiveEnum, Eq, PartialEq, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
pub enum RequestStatus {
    #[sea_orm(string_value = "PENDING")]
    Pending,
    #[sea_orm(string_value = "APPROVED")]
    Approved,
    #[sea_orm(string_value = "REJECTED")]
    Rejected,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveActiveEnum, Eq, PartialEq, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
pub enum Decision {
    #[sea_orm(string_value = "APPROVE")]
    Approve,
    #[sea_orm(string_value = "DENY")]
    Deny,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveActiveEnum, Eq, PartialEq, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
pub enum HistoryEvent {
    #[sea_orm(string_value = "GRANTED")]
    Granted,
    #[sea_orm(string_value = "REVOKED")]
    Revoked,
}
