use contentdb::schema::ContentConfig;
use proc_macro2::TokenStream;
use quote::quote;

use crate::store_gen::generate_collections_ext;
use crate::struct_gen::generate_structs;

const HEADER: &str = "// @generated by contentdb-codegen from the content configuration. Do not edit.\n\n";

/// Generate the complete bindings module for a content configuration.
///
/// The output is meant to be pulled in with `include!`, so it carries no
/// inner attributes.
pub fn generate_all(config: &ContentConfig) -> TokenStream {
    let structs = generate_structs(config);
    let collections_ext = generate_collections_ext(config);

    quote! {
        #[allow(unused_imports)]
        use serde::{Deserialize, Serialize};

        #structs

        #collections_ext
    }
}

/// Pretty-print generated tokens. Falls back to the raw token string if the
/// tokens do not parse as a file.
pub fn format_token_stream(tokens: &TokenStream) -> String {
    let body = match syn::parse2::<syn::File>(tokens.clone()) {
        Ok(file) => prettyplease::unparse(&file),
        Err(e) => {
            eprintln!("contentdb-codegen: generated code did not parse ({e}), writing unformatted output");
            tokens.to_string()
        }
    };
    format!("{HEADER}{body}")
}
