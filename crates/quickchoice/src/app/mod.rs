//! Application layer orchestrating domain logic and infrastructure.

pub mod assistant;
pub mod capture;
pub mod executor;
pub mod formatter;
pub mod macro_engine;
pub mod poll;
pub mod registrar;
pub mod runtime;
pub mod script;
pub mod store;
pub mod template;
