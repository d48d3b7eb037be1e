//! Storage access. Every function takes any [`sea_orm::ConnectionTrait`] so the
//! same call runs on the pool or inside an open transaction.

pub mod assignments;
pub mod catalog;
pub mod history;
pub mod requests;
pub mod roles;
