#![allow(unreachable_pub)]
#![allow(clippy::needless_pass_by_value)]

//! # Macros
//!
//! Procedural macros for the workflow workspace.
//!
//! * [`seis_error`] turns an enum into a context-aware error type.
//! * [`component`] wires a struct into the session registry as the implementation of a role.
//!
//! Examples are `ignore`d here because the expansions reference `seis_kernel`, which
//! depends on this crate.

mod macros;

use proc_macro::TokenStream;
use syn::{DeriveInput, ItemStruct, parse_macro_input};

/// A high-level attribute macro for defining domain-specific error enums.
///
/// # Features
///
/// * **Automatic Derives**: Injects `#[derive(Debug, thiserror::Error)]`.
/// * **Context Support**: Generates a companion `...Ext` trait that adds `.context()`
///   to any `Result` that can be converted into this error type.
/// * **Standard Conversions**: Implements `From<T>` for variants containing a `source` field,
///   enabling the use of the `?` operator for upstream errors.
/// * **Internal Fallback**: `From<&'static str>` and `From<String>` when an `Internal`
///   variant is present.
///
/// # Requirements
///
/// 1. The macro must be applied to an **enum** with named-field variants.
/// 2. Variants that carry a `source` must also carry `context: Option<Cow<'static, str>>`.
///
/// # Example
///
/// ```rust,ignore
/// use seis_derive::seis_error;
/// use std::borrow::Cow;
///
/// #[seis_error]
/// pub enum StorageError {
///     #[error("I/O failure{}: {source}", format_context(.context))]
///     Io { source: std::io::Error, context: Option<Cow<'static, str>> },
///
///     #[error("Internal fault{}: {message}", format_context(.context))]
///     Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
/// }
///
/// fn read_state(path: &std::path::Path) -> Result<Vec<u8>, StorageError> {
///     std::fs::read(path).context("Reading role state")
/// }
/// ```
#[proc_macro_attribute]
pub fn seis_error(_args: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);
    macros::error::expand_derive(input).into()
}

/// Attribute macro that registers a struct as the implementation of a workflow role.
///
/// The struct must implement `serde::Serialize` (its snapshot is what a checkpoint stores)
/// and the capability trait of its role (`System`, `Solver`, ...). The macro generates:
///
/// 1. `seis_kernel::component::Describe` with the role, the implementation name and the
///    type name (the struct name unless `type_name = "..."` overrides it).
/// 2. `seis_kernel::component::Component`, including the capability accessor for the role
///    and name-based dispatch tables for `tasks(...)` and `jobs(...)`.
///
/// Task methods have the signature `fn(&mut self, &mut Session) -> Result<(), KernelError>`;
/// job methods `fn(&mut self, &WorkerContext) -> Result<(), KernelError>`.
///
/// # Example
///
/// ```rust,ignore
/// #[seis_derive::component(role = "workflow", name = "basic", tasks(setup), jobs(tick))]
/// #[derive(Debug, serde::Serialize, serde::Deserialize)]
/// pub struct Basic {
///     iteration: u32,
/// }
/// ```
#[proc_macro_attribute]
pub fn component(args: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemStruct);
    macros::component::expand_component(args.into(), input).into()
}
