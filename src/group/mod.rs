pub mod group_dto;
pub mod group_handlers;
pub mod group_models;
pub mod group_service;
pub mod group_store;
pub mod group_workflow;
pub mod invite_code;

pub use group_models::{Group, GroupMember, MemberProfile};
pub use group_service::GroupService;
pub use group_store::{GroupStore, MemoryGroupStore, PgGroupStore};
