// handlers/protected/mod.rs - Protected handlers (JWT authentication required)
//
// Every handler here receives the caller as `Extension<Actor>` and hands it to
// a service pipeline, which makes the permission decision.

pub mod analytics;
pub mod auth;
pub mod resource;
