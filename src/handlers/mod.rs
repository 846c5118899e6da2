//! HTTP handlers for the `/api/content` surface.

pub mod drop;
pub mod stream;
