pub mod config;
pub mod error;
pub mod redact;
pub mod types;
