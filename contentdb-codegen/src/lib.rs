//! contentdb code generation - generates Rust types from a content config.yaml.
//!
//! The main entry point is [`generate_from_config`], which reads the content
//! configuration and writes a Rust source file with one data struct per
//! schema'd collection, enums for `enum` fields, nested structs for object
//! fields and a `CollectionsExt` trait with typed accessors on
//! `contentdb::ContentStore`.

mod enum_gen;
mod generator;
mod store_gen;
mod struct_gen;
pub mod type_utils;

use std::path::Path;

/// Generate Rust types from a config.yaml file.
///
/// Reads the configuration at `config_path`, generates typed Rust code, and
/// writes the output to `output_path`. This is intended to be called from a
/// `build.rs` build script.
///
/// # Example
///
/// ```no_run
/// // In build.rs:
/// let out = format!("{}/content.rs", std::env::var("OUT_DIR").unwrap());
/// contentdb_codegen::generate_from_config("content/config.yaml", &out).unwrap();
/// ```
pub fn generate_from_config(
    config_path: &str,
    output_path: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = contentdb::schema::parse_config(Path::new(config_path))?;
    let tokens = generator::generate_all(&config);
    let formatted = generator::format_token_stream(&tokens);
    std::fs::write(output_path, formatted)?;
    Ok(())
}

/// Generate Rust types from a config YAML string.
///
/// Like [`generate_from_config`] but takes the configuration content directly
/// instead of reading from a file.
pub fn generate_from_config_str(config_yaml: &str) -> Result<String, Box<dyn std::error::Error>> {
    let config = contentdb::schema::parse_config_str(config_yaml)?;
    let tokens = generator::generate_all(&config);
    let formatted = generator::format_token_stream(&tokens);
    Ok(formatted)
}
