//! Audit metadata on entities and the standalone audit log.

pub mod entry;
pub mod migrations;
mod service;
mod stamps;

pub use entry::{AuditAction, AuditEntry};
pub use service::AuditService;
pub use stamps::{AuditState, AuditStamps};
