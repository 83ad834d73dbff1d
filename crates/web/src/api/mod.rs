//! HTTP endpoint modules.

pub mod provision;
pub mod status;
