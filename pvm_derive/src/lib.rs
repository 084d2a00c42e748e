//! Derive macros for the PVM crate.
//!
//! Provides `#[derive(Error)]`, the error type boilerplate generator used by every
//! error enum in the interpreter (a `thiserror` replacement).

mod error;

use proc_macro::TokenStream;

/// Implements `Display` and `Error` for error types, plus `From` for `#[from]` fields.
#[proc_macro_derive(Error, attributes(error, from))]
pub fn derive_error(input: TokenStream) -> TokenStream {
    error::derive_error(input)
}
