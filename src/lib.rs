//! Serve a versioned content store as a blog: section listings, RSS feeds,
//! Markdown or plain-text articles and a comment form that writes back into
//! the store.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
