//! Domain layer types and invariants.

pub mod article;
pub mod comment;
pub mod path;
