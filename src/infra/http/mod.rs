//! Axum routing for the public blog surface.

pub mod flash;
mod middleware;
mod public;

pub use middleware::{REQUEST_ID_HEADER, RequestContext};
pub use public::{HttpState, build_router};
