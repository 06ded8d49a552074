//! Derive macros for Entity Sync
//!
//! # Available Macros
//!
//! - `#[derive(Entity)]` - Implements `entity_sync_core::entity::Entity` for
//!   a record struct
//!
//! # Example
//!
//! ```ignore
//! use entity_sync_macros::Entity;
//!
//! #[derive(Entity, Clone, Debug, PartialEq, Serialize, Deserialize)]
//! #[entity(model = "pod", active, status(compose = "composing", delete = "deleting"))]
//! struct Pod {
//!     #[primary_key]
//!     id: u32,
//!     name: String,
//! }
//!
//! assert_eq!(Pod::MODEL, "pod");
//! assert_eq!(Pod::status_flag("compose"), Some("composing"));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{Attribute, Data, DeriveInput, Fields, LitStr, parse_macro_input};

/// Derive macro for synchronized records
///
/// # Attributes
///
/// Container, all optional:
///
/// - `#[entity(model = "...")]` - Backend model tag. Defaults to the struct
///   name in lowercase (`ResourcePool` → `resourcepool`).
/// - `#[entity(active)]` - The collection tracks an active item
/// - `#[entity(event_errors)]` - Failures are recorded per item
/// - `#[entity(status(op = "flag", ...))]` - Operations tracked per item
/// - `#[entity(lookup(operation = "...", table = "...", key = "..."))]` -
///   A custom operation whose result is stored per request param instead of
///   upserted. Repeatable.
///
/// Field, exactly one:
///
/// - `#[primary_key]` - The field that identifies the record. Its type
///   becomes `Entity::Key` and its name `Entity::PRIMARY_KEY`.
///
/// # Panics
///
/// This macro will produce a compile error (not a runtime panic) if:
/// - Applied to anything but a struct with named fields
/// - No field, or more than one field, is marked `#[primary_key]`
/// - An `#[entity(...)]` key is unknown or malformed
///
/// # Example
///
/// ```ignore
/// #[derive(Entity, Clone, Debug, PartialEq, Serialize, Deserialize)]
/// #[entity(model = "machine", active, event_errors)]
/// struct Machine {
///     #[primary_key]
///     system_id: String,
///     hostname: String,
/// }
///
/// assert_eq!(Machine::PRIMARY_KEY, "system_id");
/// ```
#[proc_macro_derive(Entity, attributes(entity, primary_key))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_entity(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// Parsed `#[entity(...)]` options
#[derive(Debug, Default)]
struct EntityOptions {
    model: Option<String>,
    active: bool,
    event_errors: bool,
    statuses: Vec<(String, String)>,
    lookups: Vec<LookupOption>,
}

/// One `lookup(...)` entry
#[derive(Debug, PartialEq, Eq)]
struct LookupOption {
    operation: String,
    table: String,
    key: String,
}

fn expand_entity(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;

    let Data::Struct(data_struct) = &input.data else {
        return Err(syn::Error::new_spanned(
            input,
            "#[derive(Entity)] can only be used on structs",
        ));
    };
    let Fields::Named(fields) = &data_struct.fields else {
        return Err(syn::Error::new_spanned(
            input,
            "#[derive(Entity)] requires named fields",
        ));
    };

    let mut keys = fields
        .named
        .iter()
        .filter(|field| has_attribute(&field.attrs, "primary_key"));
    let Some(key_field) = keys.next() else {
        return Err(syn::Error::new_spanned(
            input,
            "#[derive(Entity)] requires one field marked #[primary_key]",
        ));
    };
    if let Some(extra) = keys.next() {
        return Err(syn::Error::new_spanned(
            extra,
            "Only one field can be marked #[primary_key]",
        ));
    }
    let Some(key_ident) = key_field.ident.as_ref() else {
        return Err(syn::Error::new_spanned(key_field, "Primary key field must be named"));
    };
    let key_type = &key_field.ty;
    let key_name = key_ident.to_string();

    let options = parse_options(&input.attrs)?;
    let model = options
        .model
        .unwrap_or_else(|| name.to_string().to_lowercase());
    let active = options.active;
    let event_errors = options.event_errors;
    let handlers = options.statuses.iter().map(|(operation, flag)| {
        quote! { ::entity_sync_core::entity::StatusHandler::new(#operation, #flag) }
    });

    let lookups = options.lookups.iter().map(|LookupOption { operation, table, key }| {
        quote! { ::entity_sync_core::entity::Lookup::new(#operation, #table, #key) }
    });

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::entity_sync_core::entity::Entity for #name #ty_generics #where_clause {
            type Key = #key_type;

            const MODEL: &'static str = #model;
            const PRIMARY_KEY: &'static str = #key_name;
            const TRACKS_ACTIVE: bool = #active;
            const STATUS_HANDLERS: &'static [::entity_sync_core::entity::StatusHandler] = &[
                #(#handlers),*
            ];
            const TRACKS_EVENT_ERRORS: bool = #event_errors;
            const LOOKUPS: &'static [::entity_sync_core::entity::Lookup] = &[
                #(#lookups),*
            ];

            fn key(&self) -> Self::Key {
                ::core::clone::Clone::clone(&self.#key_ident)
            }
        }
    })
}

fn parse_options(attrs: &[Attribute]) -> syn::Result<EntityOptions> {
    let mut options = EntityOptions::default();

    for attr in attrs.iter().filter(|attr| attr.path().is_ident("entity")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("model") {
                let model: LitStr = meta.value()?.parse()?;
                if model.value().is_empty() {
                    return Err(meta.error("model tag cannot be empty"));
                }
                options.model = Some(model.value());
                Ok(())
            } else if meta.path.is_ident("active") {
                options.active = true;
                Ok(())
            } else if meta.path.is_ident("event_errors") {
                options.event_errors = true;
                Ok(())
            } else if meta.path.is_ident("status") {
                meta.parse_nested_meta(|status| {
                    let Some(operation) = status.path.get_ident() else {
                        return Err(status.error("expected `operation = \"flag\"`"));
                    };
                    let flag: LitStr = status.value()?.parse()?;
                    let operation = operation.to_string();
                    if options.statuses.iter().any(|(existing, _)| *existing == operation) {
                        return Err(status.error(format!("duplicate status handler for `{operation}`")));
                    }
                    options.statuses.push((operation, flag.value()));
                    Ok(())
                })
            } else if meta.path.is_ident("lookup") {
                let (mut operation, mut table, mut key) = (None, None, None);
                meta.parse_nested_meta(|part| {
                    let slot = if part.path.is_ident("operation") {
                        &mut operation
                    } else if part.path.is_ident("table") {
                        &mut table
                    } else if part.path.is_ident("key") {
                        &mut key
                    } else {
                        return Err(part.error("unknown lookup option, expected `operation`, `table` or `key`"));
                    };
                    let value: LitStr = part.value()?.parse()?;
                    *slot = Some(value.value());
                    Ok(())
                })?;
                let (Some(operation), Some(table), Some(key)) = (operation, table, key) else {
                    return Err(syn::Error::new_spanned(&meta.path, "lookup requires `operation`, `table` and `key`"));
                };
                if options.lookups.iter().any(|existing| existing.operation == operation) {
                    return Err(meta.error(format!("duplicate lookup for `{operation}`")));
                }
                options.lookups.push(LookupOption { operation, table, key });
                Ok(())
            } else {
                Err(meta.error("unknown entity option, expected `model`, `active`, `event_errors`, `status` or `lookup`"))
            }
        })?;
    }

    Ok(options)
}

/// Helper function to check if an attribute list contains a specific attribute
fn has_attribute(attrs: &[Attribute], name: &str) -> bool {
    attrs.iter().any(|attr| attr.path().is_ident(name))
}
