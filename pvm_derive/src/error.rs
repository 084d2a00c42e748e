//! Derive macro for error types.
//!
//! Generates `std::fmt::Display` and `std::error::Error` implementations, and a `From`
//! conversion for every single-field tuple variant whose field carries `#[from]`.
//!
//! # Usage
//!
//! ```ignore
//! use pvm_derive::Error;
//!
//! #[derive(Debug, Error)]
//! pub enum LoadError {
//!     #[error("blob truncated while reading {0}")]
//!     Truncated(&'static str),
//!
//!     #[error("code length {code} does not match mask length {mask}")]
//!     LengthMismatch { code: usize, mask: usize },
//!
//!     #[error("decode: {0}")]
//!     Decode(#[from] DecodeError),
//!
//!     #[error("empty program")]
//!     Empty,
//! }
//! ```
//!
//! Fields that the message does not mention are bound with `_`/`..`, so a message is free to
//! show only part of the variant's payload.

use proc_macro::TokenStream;
use quote::{ToTokens, format_ident, quote};
use syn::{Data, DeriveInput, Fields, Lit, Meta, parse_macro_input};

pub fn derive_error(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match expand_error_derive(&input) {
        Ok(tokens) => TokenStream::from(tokens),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand_error_derive(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    match &input.data {
        Data::Enum(data_enum) => {
            let mut display_arms = Vec::new();
            let mut source_arms = Vec::new();
            let mut from_impls = Vec::new();

            for variant in &data_enum.variants {
                let variant_name = &variant.ident;
                let error_msg = extract_error_message(
                    &variant.attrs,
                    &variant.ident,
                    &format!("variant `{}`", variant_name),
                )?;

                let arm = match &variant.fields {
                    Fields::Unit => quote! {
                        Self::#variant_name => write!(f, #error_msg),
                    },
                    Fields::Unnamed(fields) => {
                        let format_str =
                            convert_positional_to_named(&error_msg, fields.unnamed.len());
                        let (bindings, used) = positional_bindings(&format_str, fields.unnamed.len());
                        quote! {
                            Self::#variant_name(#(#bindings),*) => write!(f, #format_str, #(#used = #used),*),
                        }
                    }
                    Fields::Named(fields) => {
                        let used: Vec<_> = fields
                            .named
                            .iter()
                            .filter_map(|field| field.ident.as_ref())
                            .filter(|ident| mentions(&error_msg, &ident.to_string()))
                            .collect();
                        quote! {
                            Self::#variant_name { #(#used,)* .. } => write!(f, #error_msg, #(#used = #used),*),
                        }
                    }
                };
                display_arms.push(arm);

                if let Fields::Unnamed(fields) = &variant.fields {
                    let from_field = fields
                        .unnamed
                        .iter()
                        .find(|field| field.attrs.iter().any(|a| a.path().is_ident("from")));
                    if let Some(field) = from_field {
                        if fields.unnamed.len() != 1 {
                            return Err(syn::Error::new_spanned(
                                variant,
                                "#[from] is only supported on single-field tuple variants",
                            ));
                        }
                        let ty = &field.ty;
                        source_arms.push(quote! {
                            Self::#variant_name(source) => Some(source),
                        });
                        from_impls.push(quote! {
                            impl #impl_generics ::std::convert::From<#ty> for #name #ty_generics #where_clause {
                                fn from(source: #ty) -> Self {
                                    Self::#variant_name(source)
                                }
                            }
                        });
                    }
                }
            }

            let source_fn = if source_arms.is_empty() {
                quote! {}
            } else {
                quote! {
                    fn source(&self) -> Option<&(dyn ::std::error::Error + 'static)> {
                        match self {
                            #(#source_arms)*
                            _ => None,
                        }
                    }
                }
            };

            Ok(quote! {
                impl #impl_generics ::std::fmt::Display for #name #ty_generics #where_clause {
                    fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                        match self {
                            #(#display_arms)*
                        }
                    }
                }

                impl #impl_generics ::std::error::Error for #name #ty_generics #where_clause {
                    #source_fn
                }

                #(#from_impls)*
            })
        }
        Data::Struct(data_struct) => {
            let error_msg = extract_error_message(
                &input.attrs,
                &input.ident,
                &format!("type `{}`", input.ident),
            )?;

            let display_body = match &data_struct.fields {
                Fields::Unit => quote! {
                    write!(f, #error_msg)
                },
                Fields::Named(fields) => {
                    let used: Vec<_> = fields
                        .named
                        .iter()
                        .filter_map(|field| field.ident.as_ref())
                        .filter(|ident| mentions(&error_msg, &ident.to_string()))
                        .collect();
                    quote! {
                        write!(f, #error_msg, #(#used = self.#used),*)
                    }
                }
                Fields::Unnamed(fields) => {
                    let format_str = convert_positional_to_named(&error_msg, fields.unnamed.len());
                    let (idents, indices): (Vec<_>, Vec<_>) = (0..fields.unnamed.len())
                        .filter(|i| mentions(&format_str, &format!("f{}", i)))
                        .map(|i| (format_ident!("f{}", i), syn::Index::from(i)))
                        .unzip();
                    quote! {
                        write!(f, #format_str, #(#idents = self.#indices),*)
                    }
                }
            };

            Ok(quote! {
                impl #impl_generics ::std::fmt::Display for #name #ty_generics #where_clause {
                    fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                        #display_body
                    }
                }

                impl #impl_generics ::std::error::Error for #name #ty_generics #where_clause {}
            })
        }
        Data::Union(_) => Err(syn::Error::new_spanned(
            input,
            "Error derive does not support unions",
        )),
    }
}

/// Builds the tuple pattern for a variant: `fN` for mentioned fields, `_` otherwise.
fn positional_bindings(
    format_str: &str,
    count: usize,
) -> (Vec<proc_macro2::TokenStream>, Vec<proc_macro2::Ident>) {
    let mut bindings = Vec::with_capacity(count);
    let mut used = Vec::new();
    for i in 0..count {
        let ident = format_ident!("f{}", i);
        if mentions(format_str, &ident.to_string()) {
            bindings.push(ident.to_token_stream());
            used.push(ident);
        } else {
            bindings.push(quote! { _ });
        }
    }
    (bindings, used)
}

/// Returns true if `format_str` interpolates `name`, with or without a format spec.
fn mentions(format_str: &str, name: &str) -> bool {
    let plain = format!("{{{}}}", name);
    let with_spec = format!("{{{}:", name);
    format_str.contains(&plain) || format_str.contains(&with_spec)
}

fn extract_error_message<T: ToTokens>(
    attrs: &[syn::Attribute],
    target: &T,
    target_desc: &str,
) -> syn::Result<String> {
    for attr in attrs {
        if !attr.path().is_ident("error") {
            continue;
        }
        let Meta::List(meta_list) = &attr.meta else {
            return Err(syn::Error::new_spanned(
                &attr.meta,
                "invalid #[error] attribute; use #[error(\"message\")] to describe the error",
            ));
        };
        let lit = syn::parse2::<Lit>(meta_list.tokens.clone()).map_err(|_| {
            syn::Error::new_spanned(
                &attr.meta,
                "failed to parse #[error] attribute; expected a string literal like #[error(\"page fault at {0}\")]",
            )
        })?;
        return match lit {
            Lit::Str(lit_str) => Ok(lit_str.value()),
            _ => Err(syn::Error::new_spanned(
                &attr.meta,
                "invalid #[error] attribute: message must be a string literal",
            )),
        };
    }

    Err(syn::Error::new_spanned(
        target,
        format!(
            "missing #[error(\"...\")] attribute on {}; every error variant must declare a display message",
            target_desc
        ),
    ))
}

/// Converts positional format args `{0}`, `{1:x}` to named args `{f0}`, `{f1:x}`.
fn convert_positional_to_named(format_str: &str, field_count: usize) -> String {
    let mut result = format_str.to_string();
    for i in (0..field_count).rev() {
        result = result
            .replace(&format!("{{{}}}", i), &format!("{{f{}}}", i))
            .replace(&format!("{{{}:", i), &format!("{{f{}:", i));
    }
    result
}
