//! Request handlers, one module per resource.

pub mod chat;
pub mod health;
pub mod records;
pub mod reports;
pub mod symptoms;
