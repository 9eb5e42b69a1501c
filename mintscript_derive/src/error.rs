//! `#[derive(Error)]` for error enums and structs.
//!
//! ```ignore
//! use mintscript_derive::Error;
//!
//! #[derive(Debug, Error)]
//! pub enum SaleError {
//!     #[error("INSUFFICIENT_STOCK")]
//!     InsufficientStock,
//!
//!     #[error("script evaluation failed: {0}")]
//!     Script(#[from] VMError),
//!
//!     #[error("expected {expected}, got {actual}")]
//!     Mismatch { expected: u32, actual: u32 },
//! }
//! ```
//!
//! Every field of a variant must be referenced by its message: `{0}` style for
//! tuple variants, `{name}` style for struct variants. A tuple variant with a
//! single `#[from]` field also gets a `From` conversion.

use proc_macro::TokenStream;
use quote::{ToTokens, format_ident, quote};
use syn::{Data, DeriveInput, Fields, Lit, Meta, parse_macro_input};

pub fn derive_error(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match expand(&input) {
        Ok(tokens) => TokenStream::from(tokens),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let display_body = match &input.data {
        Data::Enum(data_enum) => {
            let arms = data_enum
                .variants
                .iter()
                .map(|variant| {
                    let ident = &variant.ident;
                    let message = message_from_attrs(
                        &variant.attrs,
                        ident,
                        &format!("variant `{ident}`"),
                    )?;
                    Ok(match &variant.fields {
                        Fields::Unit => quote! { Self::#ident => write!(f, #message), },
                        Fields::Unnamed(fields) => {
                            let bindings: Vec<_> = (0..fields.unnamed.len())
                                .map(|i| format_ident!("f{}", i))
                                .collect();
                            let message = positional_to_named(&message, bindings.len());
                            quote! {
                                Self::#ident(#(#bindings),*) =>
                                    write!(f, #message, #(#bindings = #bindings),*),
                            }
                        }
                        Fields::Named(fields) => {
                            let names: Vec<_> = fields.named.iter().map(|f| &f.ident).collect();
                            quote! {
                                Self::#ident { #(#names),* } =>
                                    write!(f, #message, #(#names = #names),*),
                            }
                        }
                    })
                })
                .collect::<syn::Result<Vec<_>>>()?;
            quote! { match self { #(#arms)* } }
        }
        Data::Struct(data_struct) => {
            let message = message_from_attrs(&input.attrs, name, &format!("type `{name}`"))?;
            match &data_struct.fields {
                Fields::Unit => quote! { write!(f, #message) },
                Fields::Named(fields) => {
                    let names: Vec<_> = fields.named.iter().map(|f| &f.ident).collect();
                    quote! { write!(f, #message, #(#names = self.#names),*) }
                }
                Fields::Unnamed(fields) => {
                    let bindings: Vec<_> = (0..fields.unnamed.len())
                        .map(|i| format_ident!("f{}", i))
                        .collect();
                    let indices: Vec<_> = (0..fields.unnamed.len()).map(syn::Index::from).collect();
                    let message = positional_to_named(&message, bindings.len());
                    quote! { write!(f, #message, #(#bindings = self.#indices),*) }
                }
            }
        }
        Data::Union(_) => {
            return Err(syn::Error::new_spanned(
                input,
                "Error derive does not support unions",
            ));
        }
    };

    let from_impls = match &input.data {
        Data::Enum(data_enum) => from_conversions(name, data_enum)?,
        _ => Vec::new(),
    };

    Ok(quote! {
        impl #impl_generics ::std::fmt::Display for #name #ty_generics #where_clause {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                #display_body
            }
        }

        impl #impl_generics ::std::error::Error for #name #ty_generics #where_clause {}

        #(#from_impls)*
    })
}

/// Builds `From<Inner>` impls for tuple variants whose only field is tagged `#[from]`.
fn from_conversions(
    name: &syn::Ident,
    data_enum: &syn::DataEnum,
) -> syn::Result<Vec<proc_macro2::TokenStream>> {
    let mut impls = Vec::new();
    for variant in &data_enum.variants {
        let tagged: Vec<_> = variant
            .fields
            .iter()
            .filter(|field| field.attrs.iter().any(|a| a.path().is_ident("from")))
            .collect();
        if tagged.is_empty() {
            continue;
        }

        let single_unnamed = matches!(&variant.fields, Fields::Unnamed(f) if f.unnamed.len() == 1);
        if !single_unnamed {
            return Err(syn::Error::new_spanned(
                variant,
                "#[from] is only supported on tuple variants with exactly one field",
            ));
        }

        let ident = &variant.ident;
        let inner = &tagged[0].ty;
        impls.push(quote! {
            impl ::std::convert::From<#inner> for #name {
                fn from(err: #inner) -> Self {
                    Self::#ident(err)
                }
            }
        });
    }
    Ok(impls)
}

fn message_from_attrs<T: ToTokens>(
    attrs: &[syn::Attribute],
    target: &T,
    target_desc: &str,
) -> syn::Result<String> {
    let Some(attr) = attrs.iter().find(|a| a.path().is_ident("error")) else {
        return Err(syn::Error::new_spanned(
            target,
            format!("missing #[error(\"...\")] attribute on {target_desc}"),
        ));
    };

    let Meta::List(list) = &attr.meta else {
        return Err(syn::Error::new_spanned(
            &attr.meta,
            "expected #[error(\"message\")]",
        ));
    };

    match syn::parse2::<Lit>(list.tokens.clone()) {
        Ok(Lit::Str(lit)) => Ok(lit.value()),
        _ => Err(syn::Error::new_spanned(
            &attr.meta,
            "#[error] takes a single string literal, e.g. #[error(\"unknown opcode {0}\")]",
        )),
    }
}

/// Rewrites `{0}`, `{1}` into `{f0}`, `{f1}` so tuple fields can be passed by name.
fn positional_to_named(message: &str, field_count: usize) -> String {
    let mut out = message.to_string();
    for i in (0..field_count).rev() {
        out = out.replace(&format!("{{{i}}}"), &format!("{{f{i}}}"));
    }
    out
}
