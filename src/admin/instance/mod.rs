//! 发送实例（WhatsApp 发送账号）模块

pub mod api;
pub mod models;

pub use api::InstanceApi;
pub use models::{choose_instances, Instance, InstancePatch, NewInstance};
