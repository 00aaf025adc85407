// Entry type and frontmatter extraction - split Markdown/MDX into YAML metadata and raw body

use serde::de::DeserializeOwned;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

/// One content file in a collection: path-derived identity, normalized
/// frontmatter data and the untouched body text.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry<T = serde_json::Value> {
    /// Path relative to the collection directory, extension included.
    pub id: String,
    pub collection: String,
    pub data: T,
    pub body: String,
}

impl<T> Entry<T> {
    /// `id` without its file extension; `en/intro.md` -> `en/intro`.
    pub fn slug(&self) -> &str {
        slug_from_id(&self.id)
    }
}

impl Entry<serde_json::Value> {
    /// Deserialize `data` into a concrete type (user-written or generated).
    pub fn into_typed<T: DeserializeOwned>(self) -> crate::Result<Entry<T>> {
        let data = serde_json::from_value(self.data)?;
        Ok(Entry {
            id: self.id,
            collection: self.collection,
            data,
            body: self.body,
        })
    }
}

impl<T: Serialize> Serialize for Entry<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Entry", 5)?;
        state.serialize_field("id", &self.id)?;
        state.serialize_field("slug", self.slug())?;
        state.serialize_field("collection", &self.collection)?;
        state.serialize_field("data", &self.data)?;
        state.serialize_field("body", &self.body)?;
        state.end()
    }
}

/// Strip the final extension of the last path segment, nothing else.
/// Dotfile-style names (`.md`) and extensionless ids are returned unchanged.
pub fn slug_from_id(id: &str) -> &str {
    let name_start = id.rfind('/').map(|i| i + 1).unwrap_or(0);
    match id[name_start..].rfind('.') {
        Some(0) | None => id,
        Some(dot) => &id[..name_start + dot],
    }
}

/// A file split into its raw metadata mapping and verbatim body.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDocument {
    pub data: serde_json::Value,
    pub body: String,
}

const DELIMITER: &str = "---";

/// Split file contents into frontmatter and body.
///
/// The metadata block must open on the very first line with `---` and close
/// with the next line consisting only of `---`. A file without an opening
/// delimiter has empty metadata and its whole text as body. Errors are
/// returned as a human-readable reason; the caller attaches the file path.
pub fn split_frontmatter(text: &str) -> Result<RawDocument, String> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let (first_line, after_first) = split_line(text);
    if first_line.trim_end() != DELIMITER {
        return Ok(RawDocument {
            data: serde_json::Value::Object(serde_json::Map::new()),
            body: text.to_string(),
        });
    }

    let mut offset = 0;
    let mut remaining = after_first;
    loop {
        if remaining.is_empty() {
            return Err("unterminated frontmatter block (missing closing `---`)".to_string());
        }
        let (line, rest) = split_line(remaining);
        if line.trim_end() == DELIMITER {
            let yaml = &after_first[..offset];
            let data = parse_metadata(yaml)?;
            return Ok(RawDocument {
                data,
                body: rest.to_string(),
            });
        }
        offset += remaining.len() - rest.len();
        remaining = rest;
    }
}

/// Split off the first line. The returned line excludes its terminator
/// (`\n` or `\r\n`); the rest starts after it.
fn split_line(text: &str) -> (&str, &str) {
    match text.find('\n') {
        Some(i) => {
            let line = &text[..i];
            (line.strip_suffix('\r').unwrap_or(line), &text[i + 1..])
        }
        None => (text, ""),
    }
}

fn parse_metadata(yaml: &str) -> Result<serde_json::Value, String> {
    let value: serde_yaml::Value =
        serde_yaml::from_str(yaml).map_err(|e| format!("invalid frontmatter YAML: {e}"))?;

    match value {
        serde_yaml::Value::Null => Ok(serde_json::Value::Object(serde_json::Map::new())),
        serde_yaml::Value::Mapping(_) => serde_json::to_value(&value)
            .map_err(|e| format!("unsupported frontmatter value: {e}")),
        other => Err(format!(
            "frontmatter must be a mapping, got {}",
            yaml_kind(&other)
        )),
    }
}

fn yaml_kind(value: &serde_yaml::Value) -> &'static str {
    match value {
        serde_yaml::Value::Null => "null",
        serde_yaml::Value::Bool(_) => "boolean",
        serde_yaml::Value::Number(_) => "number",
        serde_yaml::Value::String(_) => "string",
        serde_yaml::Value::Sequence(_) => "list",
        serde_yaml::Value::Mapping(_) => "object",
        serde_yaml::Value::Tagged(_) => "tagged value",
    }
}
