pub mod api;
pub mod chat;
pub mod config;
pub mod db;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod reports;
pub mod symptoms;
