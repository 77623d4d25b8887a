/// Derive macro generating an implementation of the trait `Light`.
///
/// The struct needs `position`, `normal` and `intensity` fields convertible into a `Vec3`.
#[proc_macro_derive(Light)]
pub fn light_derive(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let ast = syn::parse(input);

    impl_light(ast).unwrap_or_else(|e| syn::Error::to_compile_error(&e).into())
}

fn impl_light(input: syn::Result<syn::DeriveInput>) -> syn::Result<proc_macro::TokenStream> {
    let input = input?;

    check_fields(&input.data)?;

    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote::quote! {
        impl #impl_generics ::lightcuts::Light for #name #ty_generics #where_clause {
            #[inline]
            fn position(&self) -> ::lightcuts::Vec3 {
                ::core::convert::Into::into(self.position)
            }

            #[inline]
            fn normal(&self) -> ::lightcuts::Vec3 {
                ::core::convert::Into::into(self.normal)
            }

            #[inline]
            fn intensity(&self) -> ::lightcuts::Vec3 {
                ::core::convert::Into::into(self.intensity)
            }
        }
    }
    .into())
}

fn check_fields(data: &syn::Data) -> syn::Result<()> {
    match data {
        syn::Data::Struct(struct_data) => ["position", "normal", "intensity"]
            .into_iter()
            .try_for_each(|field_name| has_field(struct_data, field_name)),
        syn::Data::Enum(enum_data) => Err(syn::Error::new_spanned(
            enum_data.enum_token,
            "the `Light` trait can only be derived for struct types",
        )),
        syn::Data::Union(union_data) => Err(syn::Error::new_spanned(
            union_data.union_token,
            "the `Light` trait can only be derived for struct types",
        )),
    }
}

fn has_field(struct_data: &syn::DataStruct, field_name: &str) -> syn::Result<()> {
    struct_data
        .fields
        .iter()
        .any(|field| field.ident.as_ref().is_some_and(|ident| ident == field_name))
        .then_some(())
        .ok_or_else(|| {
            syn::Error::new_spanned(&struct_data.fields, format!("no `{field_name}` field"))
        })
}
