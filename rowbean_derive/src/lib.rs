use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    Data, DeriveInput, Fields, Ident, LitStr, Type, parse_macro_input, spanned::Spanned,
};

/// Derives the `rowbean::Bean` trait for a named-field struct.
///
/// Declarative options ride on the `bean` attribute:
/// - `#[bean(table = "t_school")]` on the struct overrides the table name;
/// - `#[bean(column = "addr")]` on a field overrides the column name;
/// - `#[bean(pk)]` marks the primary-key field explicitly;
/// - `#[bean(skip)]` excludes a field from the mapping.
#[proc_macro_derive(Bean, attributes(bean))]
pub fn derive_bean(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_bean(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

struct MappedField {
    ident: Ident,
    ty: Type,
    column: Option<LitStr>,
    pk: bool,
}

fn expand_bean(input: DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            input.generics,
            "Bean does not support generic structs",
        ));
    }

    let table = parse_struct_options(&input.attrs)?;

    let data_struct = match input.data {
        Data::Struct(data) => data,
        _ => {
            return Err(syn::Error::new(
                struct_name.span(),
                "Bean can only be derived for structs",
            ));
        }
    };

    let named_fields = match data_struct.fields {
        Fields::Named(fields) => fields,
        _ => {
            return Err(syn::Error::new(
                struct_name.span(),
                "Bean requires named fields",
            ));
        }
    };

    let mut mapped = Vec::<MappedField>::new();
    for field in named_fields.named {
        let ident = field
            .ident
            .clone()
            .ok_or_else(|| syn::Error::new(field.span(), "Bean requires named fields"))?;
        let options = parse_field_options(&field.attrs)?;
        if options.skip {
            if options.pk || options.column.is_some() {
                return Err(syn::Error::new(
                    field.span(),
                    "#[bean(skip)] cannot be combined with other bean options",
                ));
            }
            continue;
        }
        mapped.push(MappedField {
            ident,
            ty: field.ty,
            column: options.column,
            pk: options.pk,
        });
    }

    if mapped.is_empty() {
        return Err(syn::Error::new(
            struct_name.span(),
            "Bean requires at least one mapped field",
        ));
    }

    let bean_name = struct_name.to_string();
    let table_tokens = match &table {
        Some(lit) => quote!(::core::option::Option::Some(#lit)),
        None => quote!(::core::option::Option::None),
    };

    let attribute_count = mapped.len();
    let attribute_entries = mapped.iter().map(|field| {
        let name = field.ident.to_string();
        let ty = &field.ty;
        let column = match &field.column {
            Some(lit) => quote!(::core::option::Option::Some(#lit)),
            None => quote!(::core::option::Option::None),
        };
        let pk = field.pk;
        quote! {
            ::rowbean::AttributeSpec {
                name: #name,
                column: #column,
                data_type: <#ty as ::rowbean::SqlValue>::DATA_TYPE,
                nullable: <#ty as ::rowbean::SqlValue>::NULLABLE,
                primary_key: #pk,
            }
        }
    });

    let get_arms = mapped.iter().map(|field| {
        let name = field.ident.to_string();
        let ident = &field.ident;
        let ty = &field.ty;
        quote! {
            #name => ::core::result::Result::Ok(
                <#ty as ::rowbean::SqlValue>::to_value(&self.#ident)
            ),
        }
    });

    let set_arms = mapped.iter().map(|field| {
        let name = field.ident.to_string();
        let ident = &field.ident;
        let ty = &field.ty;
        quote! {
            #name => {
                self.#ident = <#ty as ::rowbean::SqlValue>::from_value(value)?;
                ::core::result::Result::Ok(())
            }
        }
    });

    Ok(quote! {
        impl ::rowbean::Bean for #struct_name {
            fn spec(&self) -> &'static ::rowbean::BeanSpec {
                static ATTRIBUTES: [::rowbean::AttributeSpec; #attribute_count] = [
                    #(#attribute_entries),*
                ];
                static SPEC: ::rowbean::BeanSpec = ::rowbean::BeanSpec {
                    bean_name: #bean_name,
                    table: #table_tokens,
                    attributes: &ATTRIBUTES,
                };
                &SPEC
            }

            fn get(&self, attribute: &str) -> ::rowbean::Result<::rowbean::Value> {
                match attribute {
                    #(#get_arms)*
                    other => ::core::result::Result::Err(::rowbean::DaoError::Binding(
                        ::std::format!("no attribute '{}' on {}", other, #bean_name),
                    )),
                }
            }

            fn set(
                &mut self,
                attribute: &str,
                value: ::rowbean::Value,
            ) -> ::rowbean::Result<()> {
                match attribute {
                    #(#set_arms)*
                    other => ::core::result::Result::Err(::rowbean::DaoError::Binding(
                        ::std::format!("no attribute '{}' on {}", other, #bean_name),
                    )),
                }
            }

            fn as_any(&self) -> &dyn ::core::any::Any {
                self
            }

            fn as_any_mut(&mut self) -> &mut dyn ::core::any::Any {
                self
            }

            fn into_any(
                self: ::std::boxed::Box<Self>,
            ) -> ::std::boxed::Box<dyn ::core::any::Any> {
                self
            }
        }
    })
}

fn parse_struct_options(attrs: &[syn::Attribute]) -> syn::Result<Option<LitStr>> {
    let mut table = None;
    for attr in attrs {
        if !attr.path().is_ident("bean") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                table = Some(meta.value()?.parse::<LitStr>()?);
                Ok(())
            } else {
                Err(meta.error("unsupported bean option; expected `table = \"...\"`"))
            }
        })?;
    }
    Ok(table)
}

struct FieldOptions {
    column: Option<LitStr>,
    pk: bool,
    skip: bool,
}

fn parse_field_options(attrs: &[syn::Attribute]) -> syn::Result<FieldOptions> {
    let mut options = FieldOptions {
        column: None,
        pk: false,
        skip: false,
    };
    for attr in attrs {
        if !attr.path().is_ident("bean") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("column") {
                options.column = Some(meta.value()?.parse::<LitStr>()?);
                Ok(())
            } else if meta.path.is_ident("pk") {
                options.pk = true;
                Ok(())
            } else if meta.path.is_ident("skip") {
                options.skip = true;
                Ok(())
            } else {
                Err(meta.error(
                    "unsupported bean option; expected `column = \"...\"`, `pk` or `skip`",
                ))
            }
        })?;
    }
    Ok(options)
}
