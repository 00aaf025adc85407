mod parser;
mod types;

pub use parser::{parse_config, parse_config_str};
pub use types::{
    CollectionDefinition, ContentConfig, FieldDefinition, FieldType, StringFormat,
};

use crate::error::{ContentError, Result};
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};

/// A collection schema ready for validation, with its regex patterns compiled.
#[derive(Debug, Clone)]
pub struct CollectionSchema {
    pub fields: BTreeMap<String, FieldDefinition>,
    pub additional_properties: bool,
    patterns: HashMap<String, Regex>,
}

impl CollectionSchema {
    pub fn compile(
        fields: BTreeMap<String, FieldDefinition>,
        additional_properties: bool,
    ) -> Result<Self> {
        let mut patterns = HashMap::new();
        for definition in fields.values() {
            collect_patterns(definition, &mut patterns)?;
        }
        Ok(CollectionSchema {
            fields,
            additional_properties,
            patterns,
        })
    }

    /// The compiled form of a `pattern` refinement declared in this schema.
    pub fn pattern(&self, source: &str) -> Option<&Regex> {
        self.patterns.get(source)
    }
}

fn collect_patterns(
    definition: &FieldDefinition,
    patterns: &mut HashMap<String, Regex>,
) -> Result<()> {
    if let Some(source) = &definition.pattern {
        if !patterns.contains_key(source) {
            let regex = Regex::new(source)
                .map_err(|e| ContentError::config(format!("invalid pattern '{source}': {e}")))?;
            patterns.insert(source.clone(), regex);
        }
    }
    if let Some(items) = &definition.items {
        collect_patterns(items, patterns)?;
    }
    if let Some(fields) = &definition.fields {
        for nested in fields.values() {
            collect_patterns(nested, patterns)?;
        }
    }
    Ok(())
}

/// Holds the mapping from collection name to its optional schema.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    collections: BTreeMap<String, Option<CollectionSchema>>,
    config_hash: String,
}

impl SchemaRegistry {
    /// A registry with no declarations: every collection is schemaless.
    pub fn empty() -> Self {
        SchemaRegistry {
            collections: BTreeMap::new(),
            config_hash: hash_config(""),
        }
    }

    /// Parse and compile a config.yaml document.
    pub fn load(config_yaml: &str) -> Result<Self> {
        let config = parse_config_str(config_yaml)?;
        let mut registry = Self::from_config(config)?;
        registry.config_hash = hash_config(config_yaml);
        Ok(registry)
    }

    pub fn from_config(config: ContentConfig) -> Result<Self> {
        let mut collections = BTreeMap::new();
        for (name, definition) in config.collections {
            let schema = match definition.schema {
                Some(fields) => Some(
                    CollectionSchema::compile(fields, definition.additional_properties)
                        .map_err(|e| match e {
                            ContentError::Config { reason } => {
                                ContentError::config(format!("collection '{name}': {reason}"))
                            }
                            other => other,
                        })?,
                ),
                None => None,
            };
            collections.insert(name, schema);
        }
        Ok(SchemaRegistry {
            collections,
            config_hash: hash_config(""),
        })
    }

    /// Schema for a collection, or `None` when none is declared.
    pub fn get(&self, collection: &str) -> Option<&CollectionSchema> {
        self.collections.get(collection).and_then(|s| s.as_ref())
    }

    pub fn declared_collections(&self) -> impl Iterator<Item = &str> {
        self.collections.keys().map(String::as_str)
    }

    /// Fingerprint of the configuration text this registry was loaded from.
    pub fn config_hash(&self) -> &str {
        &self.config_hash
    }
}

/// SHA-256 of the configuration text, hex encoded.
pub fn hash_config(config_yaml: &str) -> String {
    let digest = Sha256::digest(config_yaml.as_bytes());
    format!("{:x}", digest)
}
