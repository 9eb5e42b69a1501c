//! `#[derive(BinaryCodec)]`: deterministic `Encode`/`Decode` implementations.
//!
//! Fields are written in declaration order using the field types' own codecs
//! (little-endian integers, length-prefixed vectors). Enums are prefixed with a
//! one-byte discriminant that honours explicit `Variant = N` assignments.
//!
//! ```ignore
//! #[derive(BinaryCodec)]
//! pub struct Script {
//!     pub sources: Vec<Vec<u8>>,
//!     pub constants: Vec<U256>,
//! }
//! ```
//!
//! Generated code refers to `crate::types::encoding`, so the derive is only
//! usable inside the mintscript crate itself.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{Data, DataEnum, DeriveInput, Fields, parse_macro_input};

pub fn derive_binary_codec(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match expand(&input) {
        Ok(tokens) => TokenStream::from(tokens),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let (encode_body, decode_body) = match &input.data {
        Data::Struct(data_struct) => {
            let (pattern, encodes) = destructure(&data_struct.fields);
            let construct = construct(&data_struct.fields);
            (
                quote! {
                    let Self #pattern = self;
                    #(#encodes)*
                },
                quote! { Ok(Self #construct) },
            )
        }
        Data::Enum(data_enum) => enum_bodies(data_enum)?,
        Data::Union(_) => {
            return Err(syn::Error::new_spanned(
                input,
                "BinaryCodec derive does not support unions",
            ));
        }
    };

    Ok(quote! {
        impl #impl_generics crate::types::encoding::Encode for #name #ty_generics #where_clause {
            #[allow(unused_variables)]
            fn encode<S: crate::types::encoding::EncodeSink>(&self, out: &mut S) {
                #encode_body
            }
        }

        impl #impl_generics crate::types::encoding::Decode for #name #ty_generics #where_clause {
            #[allow(unused_variables)]
            fn decode(
                input: &mut &[u8],
            ) -> ::std::result::Result<Self, crate::types::encoding::DecodeError> {
                #decode_body
            }
        }
    })
}

/// Returns a binding pattern for `fields` and the statements encoding each binding.
fn destructure(fields: &Fields) -> (TokenStream2, Vec<TokenStream2>) {
    match fields {
        Fields::Named(named) => {
            let names: Vec<_> = named.named.iter().map(|f| &f.ident).collect();
            let encodes = names
                .iter()
                .map(|n| quote! { crate::types::encoding::Encode::encode(#n, out); })
                .collect();
            (quote! { { #(#names),* } }, encodes)
        }
        Fields::Unnamed(unnamed) => {
            let bindings: Vec<_> = (0..unnamed.unnamed.len())
                .map(|i| format_ident!("f{}", i))
                .collect();
            let encodes = bindings
                .iter()
                .map(|b| quote! { crate::types::encoding::Encode::encode(#b, out); })
                .collect();
            (quote! { ( #(#bindings),* ) }, encodes)
        }
        Fields::Unit => (TokenStream2::new(), Vec::new()),
    }
}

/// Returns the constructor suffix that decodes every field in order.
fn construct(fields: &Fields) -> TokenStream2 {
    match fields {
        Fields::Named(named) => {
            let decodes = named.named.iter().map(|f| {
                let name = &f.ident;
                quote! { #name: crate::types::encoding::Decode::decode(input)?, }
            });
            quote! { { #(#decodes)* } }
        }
        Fields::Unnamed(unnamed) => {
            let decodes = unnamed
                .unnamed
                .iter()
                .map(|_| quote! { crate::types::encoding::Decode::decode(input)?, });
            quote! { ( #(#decodes)* ) }
        }
        Fields::Unit => TokenStream2::new(),
    }
}

fn enum_bodies(data_enum: &DataEnum) -> syn::Result<(TokenStream2, TokenStream2)> {
    let discriminants = discriminants(data_enum)?;
    let mut encode_arms = Vec::new();
    let mut decode_arms = Vec::new();

    for (variant, tag) in data_enum.variants.iter().zip(discriminants) {
        let ident = &variant.ident;
        let (pattern, encodes) = destructure(&variant.fields);
        let construct = construct(&variant.fields);

        encode_arms.push(quote! {
            Self::#ident #pattern => {
                crate::types::encoding::Encode::encode(&#tag, out);
                #(#encodes)*
            }
        });
        decode_arms.push(quote! { #tag => Ok(Self::#ident #construct), });
    }

    Ok((
        quote! { match self { #(#encode_arms)* } },
        quote! {
            let tag: u8 = crate::types::encoding::Decode::decode(input)?;
            match tag {
                #(#decode_arms)*
                _ => Err(crate::types::encoding::DecodeError::InvalidValue),
            }
        },
    ))
}

/// Resolves the one-byte tag of every variant, following Rust's implicit numbering.
fn discriminants(data_enum: &DataEnum) -> syn::Result<Vec<u8>> {
    let mut tags = Vec::with_capacity(data_enum.variants.len());
    let mut next: u16 = 0;

    for variant in &data_enum.variants {
        let tag = match &variant.discriminant {
            Some((_, expr)) => literal_u8(expr)?,
            None => u8::try_from(next).map_err(|_| {
                syn::Error::new_spanned(variant, "BinaryCodec enums support at most 256 variants")
            })?,
        };
        tags.push(tag);
        next = u16::from(tag) + 1;
    }

    Ok(tags)
}

fn literal_u8(expr: &syn::Expr) -> syn::Result<u8> {
    if let syn::Expr::Lit(syn::ExprLit {
        lit: syn::Lit::Int(int),
        ..
    }) = expr
    {
        return int.base10_parse::<u8>();
    }
    Err(syn::Error::new_spanned(
        expr,
        "BinaryCodec discriminants must be integer literals that fit in a u8",
    ))
}
