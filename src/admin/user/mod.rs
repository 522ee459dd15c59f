//! 用户管理（profiles 表）

pub mod api;
pub mod models;

pub use api::UserApi;
pub use models::{UserPatch, UserProfile};
