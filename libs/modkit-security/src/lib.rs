#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Ambient identity consumed by the repository layer.
//!
//! The context is resolved by the authentication pipeline before any data
//! access happens and is passed explicitly into every manager. Nothing here
//! performs authentication or authorization decisions.
pub mod context;
pub mod roles;

pub use context::{SecurityContext, SecurityContextBuilder};
