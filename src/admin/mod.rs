pub mod agent;
pub mod auth;
pub mod campaign;
pub mod client;
pub mod db;
pub mod ingest;
pub mod instance;
pub mod mailing;
pub mod report;
pub mod rest;
pub mod serialization;
pub mod session;
pub mod template;
pub mod types;
pub mod user;
pub mod webhook;

// 重新导出认证相关类型
pub use auth::{AuthApi, AuthContext, SignUpOutcome};
pub use session::{AuthUser, Session, SessionStore};
