//! Table models shared by the migration, the access engine and the server.

pub mod kinds;

pub mod actions;
pub mod entitlement_assignments;
pub mod entitlements;
pub mod grant_requests;
pub mod grant_responses;
pub mod group_members;
pub mod groups;
pub mod hierarchies;
pub mod orgs;
pub mod permission_histories;
pub mod resources;
pub mod revoke_requests;
pub mod role_members;
pub mod role_suite_members;
pub mod role_suite_roles;
pub mod role_suites;
pub mod roles;
pub mod users;
