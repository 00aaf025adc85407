use super::types::{
    CollectionDefinition, ContentConfig, FieldDefinition, FieldType, RawCollectionDefinition,
    RawFieldDefinition,
};
use crate::error::{ContentError, Result};
use std::collections::BTreeMap;
use std::path::Path;

/// Parse a config.yaml file into a ContentConfig
pub fn parse_config(path: &Path) -> Result<ContentConfig> {
    let content = std::fs::read_to_string(path)?;
    parse_config_str(&content)
}

/// Parse a config YAML string into a ContentConfig.
/// An empty (or comment-only) document declares no collections.
pub fn parse_config_str(content: &str) -> Result<ContentConfig> {
    let root: serde_yaml::Value = serde_yaml::from_str(content)
        .map_err(|e| ContentError::config(format!("invalid config YAML: {e}")))?;

    let mapping = match root {
        serde_yaml::Value::Null => return Ok(ContentConfig::default()),
        serde_yaml::Value::Mapping(m) => m,
        _ => {
            return Err(ContentError::config(
                "config must be a mapping of collection name to declaration",
            ))
        }
    };

    let mut collections = BTreeMap::new();
    for (key, value) in mapping {
        let name = yaml_key(&key, "collection name")?;
        let definition = parse_collection(&name, value)?;
        collections.insert(name, definition);
    }

    Ok(ContentConfig { collections })
}

fn parse_collection(name: &str, value: serde_yaml::Value) -> Result<CollectionDefinition> {
    if value.is_null() {
        return Ok(CollectionDefinition::default());
    }

    let raw: RawCollectionDefinition = serde_yaml::from_value(value)
        .map_err(|e| ContentError::config(format!("collection '{name}': {e}")))?;

    let schema = match raw.schema {
        Some(fields) => Some(parse_fields(name, fields)?),
        None => None,
    };

    Ok(CollectionDefinition {
        schema,
        additional_properties: raw.additional_properties,
    })
}

fn parse_fields(
    scope: &str,
    fields: serde_yaml::Mapping,
) -> Result<BTreeMap<String, FieldDefinition>> {
    let mut parsed = BTreeMap::new();
    for (key, value) in fields {
        let field_name = yaml_key(&key, "field name")?;
        let path = format!("{scope}.{field_name}");
        let definition = parse_field(&path, value)?;
        parsed.insert(field_name, definition);
    }
    Ok(parsed)
}

/// Expand one field expression: either the `string` / `string?` shorthand
/// or the long `{ type: ..., ... }` form.
fn parse_field(path: &str, value: serde_yaml::Value) -> Result<FieldDefinition> {
    if let serde_yaml::Value::String(shorthand) = &value {
        let (kind, optional) = match shorthand.strip_suffix('?') {
            Some(kind) => (kind, true),
            None => (shorthand.as_str(), false),
        };
        let field_type: FieldType = kind
            .trim()
            .parse()
            .map_err(|e| ContentError::config(format!("field '{path}': {e}")))?;
        let mut definition = FieldDefinition::new(field_type);
        definition.optional = optional;
        return Ok(definition);
    }

    let raw: RawFieldDefinition = serde_yaml::from_value(value)
        .map_err(|e| ContentError::config(format!("field '{path}': {e}")))?;

    let items = match raw.items {
        Some(items) => {
            if raw.field_type != FieldType::List {
                return Err(ContentError::config(format!(
                    "field '{path}': `items` is only allowed on list fields"
                )));
            }
            Some(Box::new(parse_field(&format!("{path}[]"), items)?))
        }
        None => None,
    };

    let fields = match raw.fields {
        Some(fields) => {
            if raw.field_type != FieldType::Object {
                return Err(ContentError::config(format!(
                    "field '{path}': `fields` is only allowed on object fields"
                )));
            }
            Some(parse_fields(path, fields)?)
        }
        None => None,
    };

    if raw.field_type != FieldType::String {
        if raw.enum_values.is_some() || raw.format.is_some() || raw.pattern.is_some() {
            return Err(ContentError::config(format!(
                "field '{path}': `enum`, `format` and `pattern` require type string"
            )));
        }
    }

    if let (Some(min), Some(max)) = (raw.min, raw.max) {
        if min > max {
            return Err(ContentError::config(format!(
                "field '{path}': min ({min}) is greater than max ({max})"
            )));
        }
    }

    Ok(FieldDefinition {
        field_type: raw.field_type,
        optional: raw.optional,
        default: raw.default.filter(|d| !d.is_null()),
        format: raw.format,
        pattern: raw.pattern,
        enum_values: raw.enum_values,
        min: raw.min,
        max: raw.max,
        coerce: raw.coerce,
        items,
        fields,
    })
}

fn yaml_key(key: &serde_yaml::Value, what: &str) -> Result<String> {
    match key {
        serde_yaml::Value::String(s) => Ok(s.clone()),
        other => Err(ContentError::config(format!(
            "{what} must be a string, got {other:?}"
        ))),
    }
}
