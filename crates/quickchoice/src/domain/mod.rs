//! Core domain: choice tree, heading sections, and errors.

pub mod errors;
pub mod model;
pub mod section;
pub mod tree;
