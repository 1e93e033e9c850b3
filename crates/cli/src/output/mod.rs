//! Rendering of entitlement state

pub mod json;
pub mod terminal;
