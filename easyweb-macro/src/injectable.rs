use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields, GenericArgument, PathArguments, Type};

pub fn derive_injectable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match generate_injectable_impl(&input) {
        Ok(expanded) => TokenStream::from(expanded),
        Err(err) => TokenStream::from(err.to_compile_error()),
    }
}

fn generate_injectable_impl(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    struct_name,
                    "#[derive(Injectable)] only supports structs with named fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                struct_name,
                "#[derive(Injectable)] can only be applied to structs",
            ))
        }
    };

    let field_injections = fields.iter().map(|field| {
        let field_name = &field.ident;

        match generic_argument(&field.ty, "Option") {
            Some(inner) => {
                let resolve = resolve_call(&inner);
                quote! { #field_name: #resolve.ok() }
            }
            None => {
                let resolve = resolve_call(&field.ty);
                quote! { #field_name: #resolve? }
            }
        }
    });

    Ok(quote! {
        impl #impl_generics ::easyweb::Injectable for #struct_name #ty_generics #where_clause {
            fn inject(
                container: &::easyweb::Container
            ) -> ::easyweb::Result<Self> {
                Ok(Self {
                    #(#field_injections),*
                })
            }
        }
    })
}

/// `container.resolve::<T>()` for `Arc<T>`, `container.resolve_trait::<dyn T>()` for `Arc<dyn T>`
fn resolve_call(ty: &Type) -> TokenStream2 {
    let target = generic_argument(ty, "Arc").unwrap_or_else(|| ty.clone());

    match &target {
        Type::TraitObject(_) => quote!(container.resolve_trait::<#target>()),
        _ => quote!(container.resolve::<#target>()),
    }
}

/// Extract `T` from `Wrapper<T>` when the last path segment is `wrapper`
fn generic_argument(ty: &Type, wrapper: &str) -> Option<Type> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    if segment.ident != wrapper {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first()? {
        GenericArgument::Type(inner) => Some(inner.clone()),
        _ => None,
    }
}
