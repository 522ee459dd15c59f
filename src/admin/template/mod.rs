//! 模板集合（conjunto）模块
//!
//! 一个集合最多三条消息模板，共享同一个 grupo 标识。

pub mod api;
pub mod models;

pub use api::TemplateApi;
pub use models::{NewTemplateSet, TemplateSet, TemplateSetPatch, MAX_TEMPLATES_PER_SET};
