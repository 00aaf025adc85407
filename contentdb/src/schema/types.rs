use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Top-level content configuration parsed from config.yaml
#[derive(Debug, Clone, Default, Serialize)]
pub struct ContentConfig {
    pub collections: BTreeMap<String, CollectionDefinition>,
}

/// Declaration of a single collection
#[derive(Debug, Clone, Serialize)]
pub struct CollectionDefinition {
    /// `None` when the collection is declared without a schema.
    pub schema: Option<BTreeMap<String, FieldDefinition>>,
    pub additional_properties: bool,
}

impl Default for CollectionDefinition {
    fn default() -> Self {
        CollectionDefinition {
            schema: None,
            additional_properties: true,
        }
    }
}

/// Definition of a single frontmatter field, after shorthand expansion
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDefinition {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub optional: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<StringFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    pub coerce: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<FieldDefinition>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<BTreeMap<String, FieldDefinition>>,
}

impl FieldDefinition {
    /// A bare field of the given kind: required, no refinements.
    pub fn new(field_type: FieldType) -> Self {
        FieldDefinition {
            field_type,
            optional: false,
            default: None,
            format: None,
            pattern: None,
            enum_values: None,
            min: None,
            max: None,
            coerce: false,
            items: None,
            fields: None,
        }
    }

    /// Whether an entry may omit this field without an error.
    pub fn may_be_absent(&self) -> bool {
        self.optional || self.default.is_some()
    }
}

/// Field kind enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Number,
    Integer,
    Boolean,
    Date,
    Datetime,
    List,
    Object,
    Any,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Integer => "integer",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::Datetime => "datetime",
            FieldType::List => "list",
            FieldType::Object => "object",
            FieldType::Any => "any",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "string" => Ok(FieldType::String),
            "number" => Ok(FieldType::Number),
            "integer" => Ok(FieldType::Integer),
            "boolean" => Ok(FieldType::Boolean),
            "date" => Ok(FieldType::Date),
            "datetime" => Ok(FieldType::Datetime),
            "list" => Ok(FieldType::List),
            "object" => Ok(FieldType::Object),
            "any" => Ok(FieldType::Any),
            other => Err(format!("unknown field type '{other}'")),
        }
    }
}

/// Shape refinements for string fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StringFormat {
    Email,
    Url,
}

impl StringFormat {
    pub fn describe(&self) -> &'static str {
        match self {
            StringFormat::Email => "email address",
            StringFormat::Url => "URL",
        }
    }
}

/// The long form of a field expression, as written in config.yaml.
/// `items` and `fields` stay raw so they can be expanded recursively.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawFieldDefinition {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub default: Option<serde_json::Value>,
    #[serde(default)]
    pub format: Option<StringFormat>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(rename = "enum", default)]
    pub enum_values: Option<Vec<String>>,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub coerce: bool,
    #[serde(default)]
    pub items: Option<serde_yaml::Value>,
    #[serde(default)]
    pub fields: Option<serde_yaml::Mapping>,
}

/// A collection declaration as written in config.yaml.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawCollectionDefinition {
    #[serde(default)]
    pub schema: Option<serde_yaml::Mapping>,
    #[serde(default = "default_additional_properties")]
    pub additional_properties: bool,
}

fn default_additional_properties() -> bool {
    true
}
