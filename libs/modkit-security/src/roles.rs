//! Well-known role names.

/// Cross-tenant administrator. Holders may request unfiltered queries.
pub const SYSTEM_ADMIN: &str = "SystemAdmin";

/// Administrator of a single tenant.
pub const ADMIN: &str = "Admin";
