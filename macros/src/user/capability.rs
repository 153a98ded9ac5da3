use proc_macro2::TokenStream as TokenStream2;
use quote::{quote, ToTokens};
use syn::{Attribute, DeriveInput, Expr, Member, Type};

use crate::common::{parse_meta_list, set_once};

/// Where a generated hook reads its value from.
enum Source {
    Const(TokenStream2),
    Field(Member),
}

#[derive(Default)]
struct ContainerAttrs {
    subject: Option<Type>,
    primary: bool,
    order: Option<Expr>,
    tags: Option<Vec<Expr>>,
    contracts: Vec<Type>,
}

/// `#[derive(Capability)]` implements `Capability<S>` for the annotated type
/// plus one `Implements<K>` impl per declared contract.
pub fn expand_derive_capability(input: DeriveInput) -> TokenStream2 {
    match expand(&input) {
        Ok(tokens) => tokens,
        Err(err) => err.to_compile_error(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let container = parse_container(&input.attrs)?;
    let (order_field, tags_field) = parse_fields(input)?;

    let order = match (&container.order, order_field) {
        (Some(_), Some(field)) => {
            return Err(syn::Error::new_spanned(
                field,
                "`order` is set on both the type and a field",
            ));
        }
        (Some(expr), None) => Some(Source::Const(expr.to_token_stream())),
        (None, Some(field)) => Some(Source::Field(field)),
        (None, None) => None,
    };
    let tags = match (&container.tags, tags_field) {
        (Some(_), Some(field)) => {
            return Err(syn::Error::new_spanned(
                field,
                "`tags` is set on both the type and a field",
            ));
        }
        (Some(exprs), None) => Some(Source::Const(quote! { #(#exprs),* })),
        (None, Some(field)) => Some(Source::Field(field)),
        (None, None) => None,
    };

    let ident = &input.ident;
    let (_, ty_generics, _) = input.generics.split_for_impl();

    // Without an explicit subject the impl is generic over every subject.
    let mut generics = input.generics.clone();
    let subject = match &container.subject {
        Some(ty) => ty.to_token_stream(),
        None => {
            generics
                .params
                .push(syn::parse_quote!(__S: ::tola_compose::Subject));
            quote! { __S }
        }
    };
    let (impl_generics, _, where_clause) = generics.split_for_impl();

    let order_fn = order.map(|source| {
        let body = match source {
            Source::Const(expr) => quote! { ::core::option::Option::Some(#expr) },
            Source::Field(member) => quote! {
                ::core::convert::Into::<::core::option::Option<i32>>::into(self.#member)
            },
        };
        quote! {
            #[inline]
            fn order(&self) -> ::core::option::Option<i32> {
                #body
            }
        }
    });

    let primary_fn = container.primary.then(|| {
        quote! {
            #[inline]
            fn is_primary(&self) -> bool {
                true
            }
        }
    });

    let tags_fn = tags.map(|source| {
        let body = match source {
            Source::Const(exprs) => quote! {
                static TAGS: ::std::sync::LazyLock<::std::vec::Vec<::tola_compose::Tag>> =
                    ::std::sync::LazyLock::new(|| ::tola_compose::tags![#exprs]);
                TAGS.as_slice()
            },
            Source::Field(member) => quote! {
                ::core::convert::AsRef::<[::tola_compose::Tag]>::as_ref(&self.#member)
            },
        };
        quote! {
            fn tags(&self) -> &[::tola_compose::Tag] {
                #body
            }
        }
    });

    let (own_impl_generics, _, own_where_clause) = input.generics.split_for_impl();
    let contract_impls = container.contracts.iter().map(|contract| {
        quote! {
            impl #own_impl_generics ::tola_compose::Implements<#contract> for #ident #ty_generics #own_where_clause {
                #[inline]
                fn upcast(self: ::std::sync::Arc<Self>) -> ::std::sync::Arc<#contract> {
                    self
                }
            }
        }
    });

    Ok(quote! {
        impl #impl_generics ::tola_compose::Capability<#subject> for #ident #ty_generics #where_clause {
            #order_fn
            #primary_fn
            #tags_fn
        }

        #(#contract_impls)*
    })
}

fn parse_container(attrs: &[Attribute]) -> syn::Result<ContainerAttrs> {
    let mut out = ContainerAttrs::default();
    let mut subject = None;
    let mut order = None;
    let mut tags = None;

    for attr in attrs.iter().filter(|a| a.path().is_ident("capability")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("subject") {
                let ty: Type = meta.value()?.parse()?;
                set_once(&mut subject, ty, &meta, "subject")
            } else if meta.path.is_ident("primary") {
                if out.primary {
                    return Err(meta.error("duplicate `primary` attribute"));
                }
                out.primary = true;
                Ok(())
            } else if meta.path.is_ident("order") {
                let expr: Expr = meta.value()?.parse()?;
                set_once(&mut order, expr, &meta, "order")
            } else if meta.path.is_ident("tags") {
                let exprs = parse_meta_list::<Expr>(&meta)?;
                set_once(&mut tags, exprs, &meta, "tags")
            } else if meta.path.is_ident("contracts") {
                out.contracts.extend(parse_meta_list::<Type>(&meta)?);
                Ok(())
            } else {
                Err(meta.error(
                    "unknown capability attribute, expected one of: subject, primary, order, tags, contracts",
                ))
            }
        })?;
    }

    out.subject = subject;
    out.order = order;
    out.tags = tags;
    Ok(out)
}

/// Collect the fields marked `#[capability(order)]` and `#[capability(tags)]`.
fn parse_fields(input: &DeriveInput) -> syn::Result<(Option<Member>, Option<Member>)> {
    let fields = match &input.data {
        syn::Data::Struct(data) => &data.fields,
        syn::Data::Enum(_) => return Ok((None, None)),
        syn::Data::Union(_) => {
            return Err(syn::Error::new_spanned(
                input,
                "Capability can only be derived for structs and enums",
            ));
        }
    };

    let mut order = None;
    let mut tags = None;

    for (index, field) in fields.iter().enumerate() {
        let member = match &field.ident {
            Some(ident) => Member::Named(ident.clone()),
            None => Member::Unnamed(index.into()),
        };
        for attr in field.attrs.iter().filter(|a| a.path().is_ident("capability")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("order") {
                    set_once(&mut order, member.clone(), &meta, "order")
                } else if meta.path.is_ident("tags") {
                    set_once(&mut tags, member.clone(), &meta, "tags")
                } else {
                    Err(meta.error("unknown field attribute, expected `order` or `tags`"))
                }
            })?;
        }
    }

    Ok((order, tags))
}
