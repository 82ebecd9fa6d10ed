pub mod catalog;
pub mod cli;
pub mod commands;
pub mod core;
pub mod observability;
pub mod package;
pub mod reduce;
pub mod storage;
