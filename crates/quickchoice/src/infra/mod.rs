//! Infrastructure adapters for documents, commands, prompts, notices, and config.

pub mod ai;
pub mod config;
pub mod logging;
pub mod notice;
pub mod picker;
pub mod registry;
pub mod settings_file;
pub mod vault;
