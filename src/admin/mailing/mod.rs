//! Mailing（Global 表）联系人库

pub mod api;
pub mod models;

pub use api::MailingApi;
pub use models::{MailingContact, MailingImportReport};
