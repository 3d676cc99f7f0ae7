//! # modkit-repo-macros
//!
//! Procedural macros for the `modkit-repo` data-access layer.
//!
//! ## `#[derive(Managed)]`
//!
//! Implements `ManagedEntity` for a SeaORM entity, declaring which capabilities
//! the repository may rely on.
//!
//! **IMPORTANT**: both dimensions must be explicitly specified. No implicit defaults.
//!
//! ### Example
//!
//! ```ignore
//! use sea_orm::entity::prelude::*;
//! use modkit_repo::Managed;
//!
//! #[derive(Clone, Debug, PartialEq, DeriveEntityModel, Managed)]
//! #[sea_orm(table_name = "documents")]
//! #[managed(audited, tenant_col = "tenant_id")]
//! pub struct Model {
//!     #[sea_orm(primary_key)]
//!     pub id: i32,
//!     pub tenant_id: Option<String>,
//!     pub title: String,
//!     pub created_by: Option<String>,
//!     pub created_at: Option<DateTimeUtc>,
//!     // ... remaining audit columns
//! }
//! ```
//!
//! ### Attributes
//!
//! - **Lifecycle**: `audited` OR `deleted_col = "column_name"` OR `permanent`
//! - **Tenancy**: `tenant_col = "column_name"` OR `no_tenant`

use proc_macro::TokenStream;
use proc_macro_error2::proc_macro_error;
use syn::{DeriveInput, parse_macro_input};

mod managed;

/// Derive macro for implementing `ManagedEntity`.
///
/// Place this on your SeaORM Model struct along with a `#[managed(...)]` attribute.
///
/// `audited` requires the nine conventional audit columns: `created_by`,
/// `created_at`, `modified_by`, `modified_at`, `deleted_by`, `deleted_at`,
/// `is_deleted`, `restored_by`, `restored_at`.
#[proc_macro_derive(Managed, attributes(managed))]
#[proc_macro_error]
pub fn derive_managed(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    managed::expand_derive_managed(input).into()
}
