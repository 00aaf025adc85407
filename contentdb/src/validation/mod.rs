use crate::schema::{CollectionSchema, FieldDefinition, FieldType, StringFormat};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Dotted path of the field (`author.email`, `tags[2]`); empty for the
    /// frontmatter root.
    pub field: String,
    pub expected: String,
    pub actual: String,
}

impl FieldError {
    fn new(field: &str, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        FieldError {
            field: field.to_string(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let field = if self.field.is_empty() {
            "(frontmatter)"
        } else {
            &self.field
        };
        write!(f, "{field}: expected {}, got {}", self.expected, self.actual)
    }
}

/// Validate and normalize raw frontmatter against an optional schema.
///
/// Without a schema the data passes through untouched. With one, defaults
/// are applied, values are coerced and checked, and every problem in the
/// entry is collected before failing.
pub fn normalize(
    raw: &Value,
    schema: Option<&CollectionSchema>,
) -> Result<Value, Vec<FieldError>> {
    let Some(schema) = schema else {
        return Ok(raw.clone());
    };

    let mut errors = Vec::new();
    let Some(object) = raw.as_object() else {
        errors.push(FieldError::new("", "object", describe_actual(raw)));
        return Err(errors);
    };

    let normalized = normalize_object(schema, "", &schema.fields, object, &mut errors);

    if errors.is_empty() {
        Ok(Value::Object(normalized))
    } else {
        Err(errors)
    }
}

fn normalize_object(
    schema: &CollectionSchema,
    prefix: &str,
    fields: &BTreeMap<String, FieldDefinition>,
    object: &Map<String, Value>,
    errors: &mut Vec<FieldError>,
) -> Map<String, Value> {
    let mut out = if schema.additional_properties {
        object.clone()
    } else {
        Map::new()
    };

    for (name, definition) in fields {
        let path = join_path(prefix, name);
        let present = object.get(name).filter(|v| !v.is_null());

        let source = match (present, &definition.default) {
            (Some(value), _) => value,
            (None, Some(default)) => default,
            (None, None) => {
                if !definition.optional {
                    errors.push(FieldError::new(&path, describe_expected(definition), "missing"));
                }
                continue;
            }
        };

        if let Some(value) = check_value(schema, &path, definition, source, errors) {
            out.insert(name.clone(), value);
        }
    }

    if !schema.additional_properties {
        for key in object.keys() {
            if !fields.contains_key(key) {
                errors.push(FieldError::new(
                    &join_path(prefix, key),
                    "no such field (additional_properties is false)",
                    describe_actual(&object[key]),
                ));
            }
        }
    }

    out
}

/// Check one value against its definition, returning the normalized value
/// or `None` after recording errors.
fn check_value(
    schema: &CollectionSchema,
    path: &str,
    definition: &FieldDefinition,
    value: &Value,
    errors: &mut Vec<FieldError>,
) -> Option<Value> {
    let before = errors.len();

    let normalized = match definition.field_type {
        FieldType::String => {
            let s = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) if definition.coerce => n.to_string(),
                Value::Bool(b) if definition.coerce => b.to_string(),
                other => return type_mismatch(path, definition, other, errors),
            };
            check_string(schema, path, definition, &s, errors);
            Value::String(s)
        }
        FieldType::Number => {
            let n = match value {
                Value::Number(n) => n.clone(),
                Value::String(s) if definition.coerce => match parse_number(s) {
                    Some(n) => n,
                    None => return type_mismatch(path, definition, value, errors),
                },
                other => return type_mismatch(path, definition, other, errors),
            };
            check_bounds(path, definition, n.as_f64().unwrap_or(f64::NAN), "", errors);
            Value::Number(n)
        }
        FieldType::Integer => {
            let n = match value {
                Value::Number(n) => as_integer(n),
                Value::String(s) if definition.coerce => s.trim().parse::<i64>().ok(),
                _ => None,
            };
            let Some(n) = n else {
                return type_mismatch(path, definition, value, errors);
            };
            check_bounds(path, definition, n as f64, "", errors);
            Value::Number(Number::from(n))
        }
        FieldType::Boolean => match value {
            Value::Bool(b) => Value::Bool(*b),
            Value::String(s) if definition.coerce && s.eq_ignore_ascii_case("true") => {
                Value::Bool(true)
            }
            Value::String(s) if definition.coerce && s.eq_ignore_ascii_case("false") => {
                Value::Bool(false)
            }
            other => return type_mismatch(path, definition, other, errors),
        },
        FieldType::Date => match value.as_str().and_then(parse_date) {
            Some(date) => Value::String(date.format("%Y-%m-%d").to_string()),
            None => {
                errors.push(FieldError::new(
                    path,
                    "date (YYYY-MM-DD)",
                    describe_actual(value),
                ));
                return None;
            }
        },
        FieldType::Datetime => match value.as_str().and_then(parse_datetime) {
            Some(datetime) => {
                Value::String(datetime.to_rfc3339_opts(SecondsFormat::Secs, true))
            }
            None => {
                errors.push(FieldError::new(
                    path,
                    "datetime (RFC 3339)",
                    describe_actual(value),
                ));
                return None;
            }
        },
        FieldType::List => {
            let items: Vec<Value> = match value {
                Value::Array(items) => items.clone(),
                other if definition.coerce => vec![other.clone()],
                other => return type_mismatch(path, definition, other, errors),
            };
            check_bounds(path, definition, items.len() as f64, " items", errors);

            match &definition.items {
                Some(item_definition) => Value::Array(
                    items
                        .iter()
                        .enumerate()
                        .filter_map(|(i, item)| {
                            let item_path = format!("{path}[{i}]");
                            check_value(schema, &item_path, item_definition, item, errors)
                        })
                        .collect(),
                ),
                None => Value::Array(items),
            }
        }
        FieldType::Object => {
            let Value::Object(object) = value else {
                return type_mismatch(path, definition, value, errors);
            };
            match &definition.fields {
                Some(fields) => Value::Object(normalize_object(schema, path, fields, object, errors)),
                None => value.clone(),
            }
        }
        FieldType::Any => value.clone(),
    };

    if errors.len() > before {
        None
    } else {
        Some(normalized)
    }
}

fn check_string(
    schema: &CollectionSchema,
    path: &str,
    definition: &FieldDefinition,
    s: &str,
    errors: &mut Vec<FieldError>,
) {
    let actual = || describe_actual(&Value::String(s.to_string()));

    if let Some(allowed) = &definition.enum_values {
        if !allowed.iter().any(|a| a == s) {
            errors.push(FieldError::new(
                path,
                format!("one of: {}", allowed.join(", ")),
                actual(),
            ));
        }
    }

    if let Some(format) = definition.format {
        let ok = match format {
            StringFormat::Email => email_regex().is_match(s),
            StringFormat::Url => url::Url::parse(s).is_ok(),
        };
        if !ok {
            errors.push(FieldError::new(path, format.describe(), actual()));
        }
    }

    if let Some(source) = &definition.pattern {
        // Patterns are compiled when the registry loads; a miss means the
        // definition did not come from this schema.
        let matched = match schema.pattern(source) {
            Some(regex) => regex.is_match(s),
            None => Regex::new(source).map(|r| r.is_match(s)).unwrap_or(false),
        };
        if !matched {
            errors.push(FieldError::new(
                path,
                format!("string matching /{source}/"),
                actual(),
            ));
        }
    }

    check_bounds(path, definition, s.chars().count() as f64, " characters", errors);
}

/// `min`/`max` are value bounds for numbers and length bounds for strings
/// and lists; `unit` is empty for values.
fn check_bounds(
    path: &str,
    definition: &FieldDefinition,
    measured: f64,
    unit: &str,
    errors: &mut Vec<FieldError>,
) {
    let describe = |m: f64| {
        if unit.is_empty() {
            format!("number {}", format_bound(m))
        } else {
            format!("{}{unit}", format_bound(m))
        }
    };

    if let Some(min) = definition.min {
        if measured < min || measured.is_nan() {
            let expected = if unit.is_empty() {
                format!("number >= {}", format_bound(min))
            } else {
                format!("at least {}{unit}", format_bound(min))
            };
            errors.push(FieldError::new(path, expected, describe(measured)));
        }
    }
    if let Some(max) = definition.max {
        if measured > max || measured.is_nan() {
            let expected = if unit.is_empty() {
                format!("number <= {}", format_bound(max))
            } else {
                format!("at most {}{unit}", format_bound(max))
            };
            errors.push(FieldError::new(path, expected, describe(measured)));
        }
    }
}

fn type_mismatch(
    path: &str,
    definition: &FieldDefinition,
    value: &Value,
    errors: &mut Vec<FieldError>,
) -> Option<Value> {
    errors.push(FieldError::new(
        path,
        definition.field_type.as_str(),
        describe_actual(value),
    ));
    None
}

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
    })
}

fn parse_number(s: &str) -> Option<Number> {
    let s = s.trim();
    if let Ok(i) = s.parse::<i64>() {
        return Some(Number::from(i));
    }
    s.parse::<f64>().ok().and_then(Number::from_f64)
}

fn as_integer(n: &Number) -> Option<i64> {
    if let Some(i) = n.as_i64() {
        return Some(i);
    }
    // Unsigned above i64::MAX
    if n.is_u64() {
        return None;
    }
    let f = n.as_f64()?;
    // i64::MAX as f64 rounds up to 2^63, which does not fit
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date);
    }
    // Calendar date as written, not shifted to UTC
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    parse_datetime(s).map(|dt| dt.date_naive())
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

fn format_bound(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

fn describe_expected(definition: &FieldDefinition) -> String {
    if let Some(allowed) = &definition.enum_values {
        return format!("one of: {}", allowed.join(", "));
    }
    if let Some(format) = definition.format {
        return format.describe().to_string();
    }
    definition.field_type.as_str().to_string()
}

fn describe_actual(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("boolean {b}"),
        Value::Number(n) => format!("number {n}"),
        Value::String(s) => {
            let shown: String = s.chars().take(60).collect();
            if shown.len() < s.len() {
                format!("string {:?}...", shown)
            } else {
                format!("string {:?}", s)
            }
        }
        Value::Array(items) => format!("list of {} items", items.len()),
        Value::Object(_) => "object".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaRegistry;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn test_registry() -> SchemaRegistry {
        SchemaRegistry::load(
            r#"
blog:
  schema:
    title: string
    status: { type: string, enum: [draft, published], default: draft }
    language: { type: string, default: en }
    authorContact: { type: string, format: email, optional: true }
    canonicalURL: { type: string, format: url, optional: true }
    publishDate: { type: date, optional: true }
    updatedAt: { type: datetime, optional: true }
    tags: { type: list, items: string, default: [] }
    readingTime: { type: number, coerce: true, min: 0, optional: true }
    rank: { type: integer, optional: true, max: 10 }
    featured: { type: boolean, coerce: true, optional: true }
    code: { type: string, pattern: '^[A-Z]{3}$', optional: true }
    author:
      type: object
      optional: true
      fields:
        name: string
        email: { type: string, format: email, optional: true }
strict:
  schema:
    title: string
  additional_properties: false
"#,
        )
        .unwrap()
    }

    fn run(collection: &str, data: Value) -> Result<Value, Vec<FieldError>> {
        let registry = test_registry();
        normalize(&data, registry.get(collection))
    }

    fn error_fields(errors: &[FieldError]) -> Vec<&str> {
        errors.iter().map(|e| e.field.as_str()).collect()
    }

    #[test]
    fn test_no_schema_passes_through() {
        let data = json!({ "anything": [1, 2, { "goes": true }] });
        assert_eq!(normalize(&data, None).unwrap(), data);
    }

    #[test]
    fn test_defaults_applied() {
        let data = run("blog", json!({ "title": "Hello" })).unwrap();
        assert_eq!(data["language"], "en");
        assert_eq!(data["status"], "draft");
        assert_eq!(data["tags"], json!([]));
        assert!(data.get("authorContact").is_none());
    }

    #[test]
    fn test_defaults_do_not_overwrite() {
        let data = run("blog", json!({ "title": "Hello", "language": "de" })).unwrap();
        assert_eq!(data["language"], "de");
    }

    #[test]
    fn test_null_treated_as_absent() {
        let data = run("blog", json!({ "title": "Hello", "language": null })).unwrap();
        assert_eq!(data["language"], "en");
    }

    #[test]
    fn test_email_rejected() {
        let errors = run("blog", json!({ "title": "Hello", "authorContact": "jeff" })).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "authorContact");
        assert_eq!(errors[0].expected, "email address");
        assert_eq!(errors[0].actual, "string \"jeff\"");
    }

    #[test]
    fn test_email_and_url_accepted() {
        let data = run(
            "blog",
            json!({
                "title": "Hello",
                "authorContact": "jeff@example.com",
                "canonicalURL": "https://example.com/post"
            }),
        )
        .unwrap();
        assert_eq!(data["authorContact"], "jeff@example.com");
    }

    #[test]
    fn test_url_rejected() {
        let errors =
            run("blog", json!({ "title": "Hello", "canonicalURL": "not a url" })).unwrap_err();
        assert_eq!(error_fields(&errors), vec!["canonicalURL"]);
    }

    #[test]
    fn test_all_errors_collected() {
        let errors = run(
            "blog",
            json!({
                "status": "archived",
                "authorContact": "jeff",
                "tags": ["ok", 3],
                "rank": 11
            }),
        )
        .unwrap_err();

        assert_eq!(
            error_fields(&errors),
            vec!["authorContact", "rank", "status", "tags[1]", "title"]
        );
        let title = errors.iter().find(|e| e.field == "title").unwrap();
        assert_eq!(title.actual, "missing");
    }

    #[test]
    fn test_enum_rejected() {
        let errors = run("blog", json!({ "title": "x", "status": "archived" })).unwrap_err();
        assert_eq!(errors[0].expected, "one of: draft, published");
    }

    #[test]
    fn test_type_mismatch() {
        let errors = run("blog", json!({ "title": 42 })).unwrap_err();
        assert_eq!(errors[0].field, "title");
        assert_eq!(errors[0].expected, "string");
        assert_eq!(errors[0].actual, "number 42");
    }

    #[test]
    fn test_coercion() {
        let data = run(
            "blog",
            json!({ "title": "x", "readingTime": "12", "featured": "TRUE" }),
        )
        .unwrap();
        assert_eq!(data["readingTime"], json!(12));
        assert_eq!(data["featured"], json!(true));
    }

    #[test]
    fn test_no_coercion_without_flag() {
        let errors = run("blog", json!({ "title": "x", "rank": "3" })).unwrap_err();
        assert_eq!(error_fields(&errors), vec!["rank"]);
    }

    #[test]
    fn test_number_bounds() {
        let errors = run("blog", json!({ "title": "x", "readingTime": -1 })).unwrap_err();
        assert_eq!(errors[0].expected, "number >= 0");
        assert_eq!(errors[0].actual, "number -1");
    }

    #[test]
    fn test_integer_accepts_integral_float() {
        let data = run("blog", json!({ "title": "x", "rank": 3.0 })).unwrap();
        assert_eq!(data["rank"], json!(3));
        let errors = run("blog", json!({ "title": "x", "rank": 3.5 })).unwrap_err();
        assert_eq!(errors[0].expected, "integer");
    }

    #[test]
    fn test_integer_out_of_i64_range_rejected() {
        let registry = SchemaRegistry::load("counters:\n  schema:\n    n: integer\n").unwrap();
        let schema = registry.get("counters");

        let data = normalize(&json!({ "n": i64::MAX }), schema).unwrap();
        assert_eq!(data["n"], json!(i64::MAX));

        for too_big in [json!(9223372036854775808u64), json!(9223372036854775808.0)] {
            let errors = normalize(&json!({ "n": too_big }), schema).unwrap_err();
            assert_eq!(errors[0].expected, "integer");
        }
    }

    #[test]
    fn test_date_keeps_local_calendar_day() {
        let data = run(
            "blog",
            json!({ "title": "x", "publishDate": "2024-03-01T01:00:00+02:00" }),
        )
        .unwrap();
        assert_eq!(data["publishDate"], "2024-03-01");
    }

    #[test]
    fn test_dates_normalized() {
        let data = run(
            "blog",
            json!({
                "title": "x",
                "publishDate": "2024-03-01T10:00:00+02:00",
                "updatedAt": "2024-03-01 10:30:00"
            }),
        )
        .unwrap();
        assert_eq!(data["publishDate"], "2024-03-01");
        assert_eq!(data["updatedAt"], "2024-03-01T10:30:00Z");
    }

    #[test]
    fn test_invalid_date() {
        let errors = run("blog", json!({ "title": "x", "publishDate": "yesterday" })).unwrap_err();
        assert_eq!(errors[0].expected, "date (YYYY-MM-DD)");
    }

    #[test]
    fn test_pattern() {
        assert!(run("blog", json!({ "title": "x", "code": "ABC" })).is_ok());
        let errors = run("blog", json!({ "title": "x", "code": "abc" })).unwrap_err();
        assert_eq!(errors[0].expected, "string matching /^[A-Z]{3}$/");
    }

    #[test]
    fn test_nested_object() {
        let errors = run(
            "blog",
            json!({ "title": "x", "author": { "email": "nope" } }),
        )
        .unwrap_err();
        assert_eq!(error_fields(&errors), vec!["author.email", "author.name"]);

        let data = run(
            "blog",
            json!({ "title": "x", "author": { "name": "Ada", "twitter": "@ada" } }),
        )
        .unwrap();
        assert_eq!(data["author"]["twitter"], "@ada");
    }

    #[test]
    fn test_unknown_fields_preserved_by_default() {
        let data = run("blog", json!({ "title": "x", "mood": "happy" })).unwrap();
        assert_eq!(data["mood"], "happy");
    }

    #[test]
    fn test_unknown_fields_rejected_when_closed() {
        let errors = run("strict", json!({ "title": "x", "mood": "happy" })).unwrap_err();
        assert_eq!(error_fields(&errors), vec!["mood"]);
        assert!(run("strict", json!({ "title": "x" })).is_ok());
    }

    #[test]
    fn test_non_object_root() {
        let errors = run("blog", json!(["a"])).unwrap_err();
        assert_eq!(errors[0].field, "");
        assert_eq!(errors[0].to_string(), "(frontmatter): expected object, got list of 1 items");
    }

    #[test]
    fn test_field_error_display() {
        let errors = run("blog", json!({ "title": "x", "authorContact": "jeff" })).unwrap_err();
        assert_eq!(
            errors[0].to_string(),
            "authorContact: expected email address, got string \"jeff\""
        );
    }

    #[test]
    fn test_normalize_is_deterministic() {
        let data = json!({ "title": "x", "tags": ["a", "b"], "mood": 1 });
        assert_eq!(run("blog", data.clone()).unwrap(), run("blog", data).unwrap());
    }
}
