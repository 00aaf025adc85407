use contentdb::schema::{FieldDefinition, FieldType};
use heck::{ToPascalCase, ToSnakeCase};
use proc_macro2::TokenStream;
use quote::{format_ident, quote};

/// Convert a collection name to its singular PascalCase struct name.
/// e.g. "posts" -> "Post", "blog" -> "Blog", "release-notes" -> "ReleaseNote"
pub fn collection_struct_name(collection_name: &str) -> String {
    singularize(collection_name).to_pascal_case()
}

/// Convert a collection name to a snake_case method name.
/// e.g. "blog" -> "blog", "release-notes" -> "release_notes"
pub fn collection_method_name(collection_name: &str) -> String {
    collection_name.to_snake_case()
}

/// Name of a type generated for a field: owner type name + field name.
/// e.g. ("Post", "status") -> "PostStatus", ("Post", "author") -> "PostAuthor"
pub fn nested_type_name(owner: &str, field_name: &str) -> String {
    format!("{}{}", owner, field_name.to_pascal_case())
}

/// Name of the element type of a list field.
/// e.g. "PostTags" -> "PostTagsItem"
pub fn item_type_name(list_type_name: &str) -> String {
    format!("{}Item", list_type_name)
}

/// Whether the field needs its own generated type (an enum or a struct).
pub fn needs_named_type(field: &FieldDefinition) -> bool {
    field.enum_values.is_some()
        || (field.field_type == FieldType::Object && field.fields.is_some())
}

/// Map a schema field to its Rust type as a TokenStream.
/// `type_name` is the name used when the field has a generated type.
pub fn field_to_rust_type(field: &FieldDefinition, type_name: &str) -> TokenStream {
    let base_type = field_base_type(field, type_name);

    // Optional lists default to empty instead of None
    if field.optional && field.default.is_none() && field.field_type != FieldType::List {
        quote! { Option<#base_type> }
    } else {
        base_type
    }
}

/// Get the base Rust type (without Option wrapping) for a field.
pub fn field_base_type(field: &FieldDefinition, type_name: &str) -> TokenStream {
    if needs_named_type(field) {
        let ident = format_ident!("{}", type_name);
        return quote! { #ident };
    }

    match field.field_type {
        FieldType::String => quote! { String },
        FieldType::Number => quote! { f64 },
        FieldType::Integer => quote! { i64 },
        FieldType::Boolean => quote! { bool },
        FieldType::Date => quote! { chrono::NaiveDate },
        FieldType::Datetime => quote! { chrono::DateTime<chrono::Utc> },
        FieldType::Object | FieldType::Any => quote! { serde_json::Value },
        FieldType::List => {
            let item_type = match &field.items {
                Some(items) => field_base_type(items, &item_type_name(type_name)),
                None => quote! { serde_json::Value },
            };
            quote! { Vec<#item_type> }
        }
    }
}

/// Whether the base Rust type for the field implements `Default`.
pub fn has_default_impl(field: &FieldDefinition) -> bool {
    if let Some(values) = &field.enum_values {
        // Matches the condition under which the enum gets a Default impl
        let default = field.default.as_ref().and_then(|d| d.as_str());
        return default.is_some_and(|d| values.iter().any(|v| v == d));
    }
    match field.field_type {
        FieldType::Date | FieldType::Datetime => false,
        FieldType::Object => field.fields.is_none(),
        _ => true,
    }
}

/// Naive singularization of English words.
pub fn singularize(word: &str) -> String {
    let w = word.to_lowercase();
    if w.ends_with("ies") {
        format!("{}y", &w[..w.len() - 3])
    } else if w.ends_with("ses") || w.ends_with("xes") || w.ends_with("zes") {
        w[..w.len() - 2].to_string()
    } else if w.ends_with("ves") {
        format!("{}f", &w[..w.len() - 3])
    } else if w.ends_with('s') && !w.ends_with("ss") {
        w[..w.len() - 1].to_string()
    } else {
        w
    }
}

/// Snake-case identifier for a field or method name, using raw identifier
/// syntax for Rust keywords.
pub fn safe_field_ident(name: &str) -> proc_macro2::Ident {
    let snake = name.to_snake_case();
    match snake.as_str() {
        "type" | "struct" | "enum" | "fn" | "let" | "mut" | "ref" | "mod" | "use" | "pub"
        | "impl" | "trait" | "for" | "loop" | "while" | "if" | "else" | "match" | "return"
        | "break" | "continue" | "as" | "in" | "where" | "async" | "await" | "dyn" | "move"
        | "static" | "const" | "unsafe" | "extern" | "true" | "false" | "abstract"
        | "become" | "box" | "do" | "final" | "macro" | "override" | "priv" | "typeof"
        | "unsized" | "virtual" | "yield" | "try" => format_ident!("r#{}", snake),
        // Not usable as raw identifiers
        "self" | "super" | "crate" => format_ident!("{}_", snake),
        "" => format_ident!("field"),
        _ if snake.starts_with(|c: char| c.is_ascii_digit()) => format_ident!("_{}", snake),
        _ => format_ident!("{}", snake),
    }
}

/// Identifier for an enum variant built from an arbitrary value string.
pub fn enum_variant_ident(value: &str) -> proc_macro2::Ident {
    let pascal = value.to_pascal_case();
    if pascal.is_empty() {
        format_ident!("Empty")
    } else if pascal.starts_with(|c: char| c.is_ascii_digit()) {
        format_ident!("V{}", pascal)
    } else {
        format_ident!("{}", pascal)
    }
}
