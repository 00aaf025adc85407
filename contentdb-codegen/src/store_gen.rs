use contentdb::schema::ContentConfig;
use proc_macro2::TokenStream;
use quote::{format_ident, quote};

use crate::type_utils::{collection_method_name, collection_struct_name, safe_field_ident};

/// Generate the CollectionsExt trait with typed accessors for every declared
/// collection. Collections without a schema are exposed as raw JSON data.
pub fn generate_collections_ext(config: &ContentConfig) -> TokenStream {
    let mut trait_methods = Vec::new();
    let mut impl_methods = Vec::new();

    for (collection_name, collection_def) in &config.collections {
        let method_ident = safe_field_ident(&collection_method_name(collection_name));
        let entry_ident =
            safe_field_ident(&format!("{}_entry", collection_method_name(collection_name)));
        let collection_name_lit = collection_name.as_str();

        let data_type = if collection_def.schema.is_some() {
            let struct_ident = format_ident!("{}", collection_struct_name(collection_name));
            quote! { #struct_ident }
        } else {
            quote! { serde_json::Value }
        };

        let list_doc = format!(" All valid entries of the `{}` collection, in path order.", collection_name);
        let entry_doc = format!(" One entry of the `{}` collection by id.", collection_name);

        trait_methods.push(quote! {
            #[doc = #list_doc]
            fn #method_ident(&self) -> contentdb::Result<Vec<contentdb::Entry<#data_type>>>;

            #[doc = #entry_doc]
            fn #entry_ident(&self, id: &str) -> contentdb::Result<contentdb::Entry<#data_type>>;
        });

        impl_methods.push(quote! {
            fn #method_ident(&self) -> contentdb::Result<Vec<contentdb::Entry<#data_type>>> {
                self.get_collection_as(#collection_name_lit)
            }

            fn #entry_ident(&self, id: &str) -> contentdb::Result<contentdb::Entry<#data_type>> {
                self.get_entry_as(#collection_name_lit, id)
            }
        });
    }

    quote! {
        /// Extension trait providing typed collection accessors.
        pub trait CollectionsExt {
            #(#trait_methods)*
        }

        impl CollectionsExt for contentdb::ContentStore {
            #(#impl_methods)*
        }
    }
}
