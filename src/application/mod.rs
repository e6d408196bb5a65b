//! Application services: content handlers, path resolution, feeds and errors.

pub mod blog;
pub mod error;
pub mod handler;
pub mod store;
pub mod syndication;
