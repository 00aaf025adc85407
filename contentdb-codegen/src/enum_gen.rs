use proc_macro2::TokenStream;
use quote::{format_ident, quote};

use crate::type_utils::enum_variant_ident;

/// Generate a value enum for a field with `enum` values, e.g. `PostStatus`.
///
/// Every variant carries an explicit `serde(rename)` so the wire value is
/// exactly the configured string. A `Default` impl is emitted when the field
/// declares a default that names one of the values.
pub fn generate_value_enum(
    type_name: &str,
    enum_values: &[String],
    default: Option<&serde_json::Value>,
) -> TokenStream {
    let type_ident = format_ident!("{}", type_name);

    let variants: Vec<_> = enum_values
        .iter()
        .map(|value| {
            let variant = enum_variant_ident(value);
            quote! {
                #[serde(rename = #value)]
                #variant
            }
        })
        .collect();

    let default_impl = default
        .and_then(|value| value.as_str())
        .filter(|value| enum_values.iter().any(|v| v == value))
        .map(|value| {
            let default_variant = enum_variant_ident(value);
            quote! {
                impl Default for #type_ident {
                    fn default() -> Self {
                        Self::#default_variant
                    }
                }
            }
        });

    quote! {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum #type_ident {
            #(#variants),*
        }

        #default_impl
    }
}
