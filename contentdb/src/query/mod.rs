// Queries - read-only lookups over an index snapshot

use crate::document::Entry;
use crate::error::{ContentError, Result};
use crate::index::{CollectionIndex, EntryIndex};
use serde::de::DeserializeOwned;
use serde_json::Value;

impl EntryIndex {
    fn require(&self, collection: &str) -> Result<&CollectionIndex> {
        self.collections
            .get(collection)
            .ok_or_else(|| ContentError::CollectionNotFound {
                collection: collection.to_string(),
            })
    }

    /// Collection names in index order.
    pub fn collection_names(&self) -> Vec<&str> {
        self.collections.keys().map(String::as_str).collect()
    }

    pub fn get_collection(&self, collection: &str) -> Result<&[Entry]> {
        Ok(self.require(collection)?.entries())
    }

    /// Entries for which `predicate` holds, in index order.
    pub fn get_collection_where<P>(&self, collection: &str, predicate: P) -> Result<Vec<&Entry>>
    where
        P: Fn(&Entry) -> bool,
    {
        Ok(self
            .require(collection)?
            .entries()
            .iter()
            .filter(|entry| predicate(entry))
            .collect())
    }

    pub fn get_entry(&self, collection: &str, id: &str) -> Result<&Entry> {
        let index = self.require(collection)?;
        index
            .by_id
            .get(id)
            .map(|&i| &index.entries[i])
            .ok_or_else(|| ContentError::EntryNotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })
    }

    /// First entry (in index order) whose slug matches.
    pub fn get_entry_by_slug(&self, collection: &str, slug: &str) -> Result<&Entry> {
        self.require(collection)?
            .entries()
            .iter()
            .find(|entry| entry.slug() == slug)
            .ok_or_else(|| ContentError::EntryNotFound {
                collection: collection.to_string(),
                id: slug.to_string(),
            })
    }

    pub fn get_collection_as<T: DeserializeOwned>(&self, collection: &str) -> Result<Vec<Entry<T>>> {
        self.get_collection(collection)?
            .iter()
            .map(|entry| entry.clone().into_typed())
            .collect()
    }

    pub fn get_entry_as<T: DeserializeOwned>(&self, collection: &str, id: &str) -> Result<Entry<T>> {
        self.get_entry(collection, id)?.clone().into_typed()
    }
}

/// A `field=value` filter, as accepted on the command line.
///
/// `id` and `slug` match the entry identity; any other field is a dotted
/// path into `data` (`author.name`). The value is compared as YAML, so
/// `draft=true` matches a boolean and `rank=3` a number, with a fallback to
/// string comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    pub field: String,
    pub value: String,
}

impl FieldFilter {
    pub fn parse(expr: &str) -> Result<Self> {
        match expr.split_once('=') {
            Some((field, value)) if !field.trim().is_empty() => Ok(FieldFilter {
                field: field.trim().to_string(),
                value: value.trim().to_string(),
            }),
            _ => Err(ContentError::Other(format!(
                "Invalid filter '{}': expected field=value",
                expr
            ))),
        }
    }

    pub fn matches(&self, entry: &Entry) -> bool {
        match self.field.as_str() {
            "id" => entry.id == self.value,
            "slug" => entry.slug() == self.value,
            path => match lookup(&entry.data, path) {
                Some(actual) => self.value_matches(actual),
                None => false,
            },
        }
    }

    fn value_matches(&self, actual: &Value) -> bool {
        if let Value::Array(items) = actual {
            return items.iter().any(|item| self.value_matches(item));
        }
        if let Ok(expected) = serde_yaml::from_str::<Value>(&self.value) {
            if &expected == actual {
                return true;
            }
        }
        match actual {
            Value::String(s) => s == &self.value,
            other => other.to_string() == self.value,
        }
    }
}

fn lookup<'v>(data: &'v Value, path: &str) -> Option<&'v Value> {
    path.split('.').try_fold(data, |value, key| value.get(key))
}
