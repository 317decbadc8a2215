use proc_macro::TokenStream;
use quote::quote;
use syn::{
    parse_macro_input, punctuated::Punctuated, spanned::Spanned, token::Comma, Data, DeriveInput,
    Error, Field, Fields, Ident,
};

/// Implements `crate::output::TableOutputRow` for a struct with named fields. Columns follow
/// the field order, headers are the uppercased field names with underscores turned into
/// spaces. The field marked with `#[name_column]` is what `--output names` prints.
#[proc_macro_derive(TableOutputRow, attributes(name_column))]
pub fn derive_output_display(input: TokenStream) -> TokenStream {
    let parsed_input = parse_macro_input!(input as DeriveInput);

    match expand(parsed_input) {
        Ok(output) => output,
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(parsed_input: DeriveInput) -> Result<TokenStream, Error> {
    let span = parsed_input.span();
    let struct_ident = parsed_input.ident;
    let (impl_generics, type_generics, where_clause) = parsed_input.generics.split_for_impl();
    let fields = match parsed_input.data {
        Data::Struct(s) => match s.fields {
            Fields::Named(fields) => fields.named,
            _ => return Err(Error::new(span, "TableOutputRow needs a struct with named fields!")),
        },
        _ => return Err(Error::new(span, "TableOutputRow is only applicable to structs!")),
    };
    let name_field = get_name_column_field(&fields)
        .ok_or_else(|| Error::new(span, "This struct is missing a 'name_column' attribute!"))?;
    let column_names = get_column_names(&fields);
    let field_names = fields.iter().filter_map(|f| f.ident.as_ref()).collect::<Vec<_>>();
    let field_count = field_names.len();

    Ok(quote! {
        impl #impl_generics crate::output::TableOutputRow for #struct_ident #type_generics #where_clause {
            fn get_name(&self) -> ::std::string::String {
                ::std::string::ToString::to_string(&self.#name_field)
            }

            fn get_column_names() -> ::std::vec::Vec<::std::string::String> {
                ::std::vec![#(#column_names.to_owned()),*]
            }

            fn get_column_count() -> usize {
                #field_count
            }

            fn get_row(&self) -> ::std::vec::Vec<::std::string::String> {
                ::std::vec![#(::std::string::ToString::to_string(&self.#field_names)),*]
            }
        }
    }
    .into())
}

fn get_column_names(fields: &Punctuated<Field, Comma>) -> Vec<String> {
    fields
        .iter()
        .filter_map(|f| f.ident.as_ref())
        .map(|ident| ident.to_string().to_uppercase().replace('_', " "))
        .collect()
}

fn get_name_column_field(fields: &Punctuated<Field, Comma>) -> Option<&Ident> {
    fields
        .iter()
        .find(|f| f.attrs.iter().any(|a| a.meta.path().is_ident("name_column")))
        .and_then(|f| f.ident.as_ref())
}
