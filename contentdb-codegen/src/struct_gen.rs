use contentdb::schema::{ContentConfig, FieldDefinition, FieldType};
use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use std::collections::BTreeMap;

use crate::enum_gen::generate_value_enum;
use crate::type_utils::{
    collection_struct_name, field_to_rust_type, has_default_impl, item_type_name,
    nested_type_name, safe_field_ident,
};

/// Generate data structs (and the enums and nested structs they use) for
/// every collection that declares a schema.
pub fn generate_structs(config: &ContentConfig) -> TokenStream {
    let mut tokens = TokenStream::new();

    for (collection_name, collection_def) in &config.collections {
        let Some(fields) = &collection_def.schema else {
            continue;
        };
        let struct_name = collection_struct_name(collection_name);
        let doc_comment = format!(" Frontmatter of an entry in the `{}` collection.", collection_name);
        tokens.extend(generate_struct(
            &struct_name,
            fields,
            &doc_comment,
            collection_def.additional_properties,
        ));
    }

    tokens
}

/// Generate one struct plus every type its fields need, dependencies first.
fn generate_struct(
    struct_name: &str,
    fields: &BTreeMap<String, FieldDefinition>,
    doc_comment: &str,
    keep_extra: bool,
) -> TokenStream {
    let mut tokens = TokenStream::new();
    let struct_ident = format_ident!("{}", struct_name);

    let mut field_tokens = Vec::new();
    for (field_name, field_def) in fields {
        let type_name = nested_type_name(struct_name, field_name);
        tokens.extend(generate_field_types(&type_name, field_def));

        let ident = safe_field_ident(field_name);
        let ty = field_to_rust_type(field_def, &type_name);
        field_tokens.push(generate_field_with_attrs(&ident, &ty, field_def, field_name));
    }

    // Undeclared frontmatter is preserved by validation; keep it reachable.
    let extra = if keep_extra && !fields.contains_key("extra") {
        Some(quote! {
            #[serde(flatten)]
            pub extra: serde_json::Map<String, serde_json::Value>,
        })
    } else {
        None
    };

    tokens.extend(quote! {
        #[doc = #doc_comment]
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        pub struct #struct_ident {
            #(#field_tokens)*
            #extra
        }
    });

    tokens
}

/// Types a single field needs: an enum for `enum` values, a struct for an
/// object with declared fields, recursing into list items.
fn generate_field_types(type_name: &str, field_def: &FieldDefinition) -> TokenStream {
    if let Some(values) = &field_def.enum_values {
        return generate_value_enum(type_name, values, field_def.default.as_ref());
    }

    match field_def.field_type {
        FieldType::Object => match &field_def.fields {
            Some(fields) => {
                let doc_comment = format!(" Nested `{}` object.", type_name);
                generate_struct(type_name, fields, &doc_comment, false)
            }
            None => TokenStream::new(),
        },
        FieldType::List => match &field_def.items {
            Some(items) => generate_field_types(&item_type_name(type_name), items),
            None => TokenStream::new(),
        },
        _ => TokenStream::new(),
    }
}

/// Generate a struct field with appropriate serde attributes.
fn generate_field_with_attrs(
    ident: &proc_macro2::Ident,
    ty: &TokenStream,
    field_def: &FieldDefinition,
    field_name: &str,
) -> TokenStream {
    let ident_str = ident.to_string();
    let rename_attr = if ident_str.trim_start_matches("r#") != field_name {
        Some(quote! { #[serde(rename = #field_name)] })
    } else {
        None
    };

    let serde_attrs = generate_serde_attrs(field_def);

    quote! {
        #rename_attr
        #serde_attrs
        pub #ident: #ty,
    }
}

fn generate_serde_attrs(field_def: &FieldDefinition) -> TokenStream {
    if field_def.field_type == FieldType::List && field_def.may_be_absent() {
        // Lists always fall back to empty
        quote! { #[serde(default)] }
    } else if field_def.default.is_some() {
        // Validation fills defaults in; this only matters for hand-built data
        if has_default_impl(field_def) {
            quote! { #[serde(default)] }
        } else {
            quote! {}
        }
    } else if field_def.optional {
        quote! { #[serde(default, skip_serializing_if = "Option::is_none")] }
    } else {
        quote! {}
    }
}
