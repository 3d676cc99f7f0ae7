use heck::ToUpperCamelCase;
use proc_macro_error2::abort;
use proc_macro2::{Span, TokenStream};
use quote::quote;
use syn::{Data, DeriveInput, spanned::Spanned};

const AUDIT_COLUMNS: [&str; 9] = [
    "created_by",
    "created_at",
    "modified_by",
    "modified_at",
    "deleted_by",
    "deleted_at",
    "is_deleted",
    "restored_by",
    "restored_at",
];

/// Lifecycle decision parsed from `#[managed(...)]`
enum LifecycleDecl {
    Audited,
    DeletedCol(String),
    Permanent,
}

/// Configuration parsed from `#[managed(...)]` attributes
#[derive(Default)]
struct ManagedConfig {
    lifecycle: Option<(LifecycleDecl, Span)>,
    tenant_col: Option<(String, Span)>,
    no_tenant: Option<Span>,
}

#[allow(clippy::needless_pass_by_value)] // DeriveInput is consumed by proc-macro pattern
pub fn expand_derive_managed(input: DeriveInput) -> TokenStream {
    let Data::Struct(data) = &input.data else {
        abort!(
            input.span(),
            "#[derive(Managed)] can only be applied to structs"
        );
    };

    let config = parse_managed_attrs(&input);
    let span = input.ident.span();

    let Some((lifecycle, lifecycle_span)) = config.lifecycle else {
        abort!(
            input.span(),
            "managed: missing explicit lifecycle decision:\n  \
             use `audited`, `deleted_col = \"column_name\"` or `permanent`"
        );
    };
    if config.tenant_col.is_none() && config.no_tenant.is_none() {
        abort!(
            input.span(),
            "managed: missing explicit decision for tenant:\n  \
             use `tenant_col = \"column_name\"` or `no_tenant`"
        );
    }

    if matches!(lifecycle, LifecycleDecl::Audited) {
        let fields: Vec<String> = data
            .fields
            .iter()
            .filter_map(|f| f.ident.as_ref().map(ToString::to_string))
            .collect();
        if let Some(missing) = AUDIT_COLUMNS
            .iter()
            .find(|col| !fields.iter().any(|f| f == *col))
        {
            abort!(
                lifecycle_span,
                "managed: `audited` requires a `{}` field on the model",
                missing
            );
        }
    }

    let lifecycle_impl = generate_lifecycle_impl(&lifecycle, span);
    let tenant_impl = generate_tenant_impl(config.tenant_col.as_ref(), span);
    let entity_ident = syn::Ident::new("Entity", span);

    quote! {
        impl ::modkit_repo::ManagedEntity for #entity_ident {
            #lifecycle_impl

            #tenant_impl
        }
    }
}

fn generate_lifecycle_impl(lifecycle: &LifecycleDecl, span: Span) -> TokenStream {
    let body = match lifecycle {
        LifecycleDecl::Audited => {
            let fields = AUDIT_COLUMNS.iter().map(|name| {
                let field = syn::Ident::new(name, span);
                let variant = column_ident(name, span);
                quote! { #field: Self::Column::#variant }
            });
            quote! {
                ::modkit_repo::Lifecycle::Audited(::modkit_repo::AuditColumns {
                    #(#fields,)*
                })
            }
        }
        LifecycleDecl::DeletedCol(col) => {
            let variant = column_ident(col, span);
            quote! { ::modkit_repo::Lifecycle::DeletedFlag(Self::Column::#variant) }
        }
        LifecycleDecl::Permanent => quote! { ::modkit_repo::Lifecycle::Permanent },
    };

    quote! {
        fn lifecycle() -> ::modkit_repo::Lifecycle<Self::Column> {
            #body
        }
    }
}

fn generate_tenant_impl(col: Option<&(String, Span)>, span: Span) -> TokenStream {
    if let Some((col_name, _)) = col {
        let variant = column_ident(col_name, span);
        quote! {
            fn tenant_col() -> ::core::option::Option<Self::Column> {
                ::core::option::Option::Some(Self::Column::#variant)
            }
        }
    } else {
        quote! {
            fn tenant_col() -> ::core::option::Option<Self::Column> {
                ::core::option::Option::None
            }
        }
    }
}

fn column_ident(col: &str, span: Span) -> syn::Ident {
    syn::Ident::new(&snake_to_upper_camel(col), span)
}

/// Parse all `#[managed(...)]` attributes with duplicate detection
fn parse_managed_attrs(input: &DeriveInput) -> ManagedConfig {
    let mut config = ManagedConfig::default();

    for attr in &input.attrs {
        if !attr.path().is_ident("managed") {
            continue;
        }

        let result = attr.parse_nested_meta(|meta| {
            let span = meta.path.span();
            let key = meta
                .path
                .get_ident()
                .map(ToString::to_string)
                .unwrap_or_default();

            match key.as_str() {
                "audited" | "permanent" => {
                    let decl = if key == "audited" {
                        LifecycleDecl::Audited
                    } else {
                        LifecycleDecl::Permanent
                    };
                    set_lifecycle(&mut config, decl, span);
                }
                "deleted_col" => {
                    let value = string_value(&meta, span);
                    set_lifecycle(&mut config, LifecycleDecl::DeletedCol(value), span);
                }
                "no_tenant" => {
                    if config.no_tenant.is_some() {
                        abort!(span, "duplicate attribute 'no_tenant'");
                    }
                    if config.tenant_col.is_some() {
                        abort!(
                            span,
                            "managed: specify either `tenant_col` or `no_tenant`, not both"
                        );
                    }
                    config.no_tenant = Some(span);
                }
                "tenant_col" => {
                    let value = string_value(&meta, span);
                    if config.tenant_col.is_some() {
                        abort!(span, "duplicate attribute 'tenant_col'");
                    }
                    if config.no_tenant.is_some() {
                        abort!(
                            span,
                            "managed: specify either `tenant_col` or `no_tenant`, not both"
                        );
                    }
                    config.tenant_col = Some((value, span));
                }
                "" => abort!(span, "Expected attribute name"),
                _ => abort!(
                    span,
                    "Unknown attribute '{}'. Valid attributes: audited, deleted_col, permanent, tenant_col, no_tenant",
                    key
                ),
            }

            Ok(())
        });

        if let Err(err) = result {
            abort!(err.span(), "{}", err);
        }
    }

    config
}

fn set_lifecycle(config: &mut ManagedConfig, decl: LifecycleDecl, span: Span) {
    if config.lifecycle.is_some() {
        abort!(
            span,
            "managed: specify exactly one of `audited`, `deleted_col` or `permanent`"
        );
    }
    config.lifecycle = Some((decl, span));
}

fn string_value(meta: &syn::meta::ParseNestedMeta<'_>, span: Span) -> String {
    match meta.value() {
        Ok(v) => match v.parse::<syn::LitStr>() {
            Ok(lit) => lit.value(),
            Err(_) => abort!(span, "Expected string literal"),
        },
        Err(_) => abort!(span, "Expected '=' followed by a string value"),
    }
}

/// Convert `snake_case` to `UpperCamelCase` for enum variant names
fn snake_to_upper_camel(s: &str) -> String {
    s.to_upper_camel_case()
}
