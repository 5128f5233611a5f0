// handlers/mod.rs - Two-tier handler layout
//
// Public (no auth) → Protected (Bearer JWT, actor injected by auth_middleware)

pub mod protected;
pub mod public;
