//! JSON-schema sanitizer.
//!
//! MCP servers often advertise schemas with dialect metadata (`$schema`,
//! `additionalProperties`, `title`, `default`, ...) that some model backends
//! reject. Only the core keywords survive.

use serde_json::{Map, Value};

const KEPT_KEYWORDS: [&str; 6] = ["type", "properties", "required", "items", "enum", "description"];

/// Strip everything but `type`, `properties`, `required`, `items`, `enum`
/// and `description`, recursing into property schemas and `items`.
pub fn sanitize_schema(schema: Value) -> Value {
    let Value::Object(map) = schema else {
        return schema;
    };

    let mut out = Map::new();
    for (key, value) in map {
        if !KEPT_KEYWORDS.contains(&key.as_str()) {
            continue;
        }
        let value = match key.as_str() {
            "properties" => match value {
                Value::Object(props) => Value::Object(
                    props
                        .into_iter()
                        .map(|(name, prop)| (name, sanitize_schema(prop)))
                        .collect(),
                ),
                other => other,
            },
            "items" => match value {
                Value::Array(items) => {
                    Value::Array(items.into_iter().map(sanitize_schema).collect())
                }
                other => sanitize_schema(other),
            },
            _ => value,
        };
        out.insert(key, value);
    }
    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strips_dialect_keywords() {
        let schema = json!({
            "$schema": "http://json-schema.org/draft-07/schema#",
            "type": "object",
            "additionalProperties": false,
            "title": "Args",
            "properties": {
                "path": { "type": "string", "description": "Where", "default": "." }
            },
            "required": ["path"]
        });
        let clean = sanitize_schema(schema);
        assert_eq!(
            clean,
            json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "Where" }
                },
                "required": ["path"]
            })
        );
    }

    #[test]
    fn keeps_property_named_like_a_keyword() {
        let schema = json!({
            "type": "object",
            "properties": {
                "title": { "type": "string", "format": "text" }
            }
        });
        let clean = sanitize_schema(schema);
        assert_eq!(clean["properties"]["title"], json!({ "type": "string" }));
    }

    #[test]
    fn recurses_into_items() {
        let schema = json!({
            "type": "array",
            "items": {
                "type": "object",
                "examples": [{}],
                "properties": { "mode": { "type": "string", "enum": ["r", "w"], "minLength": 1 } }
            }
        });
        let clean = sanitize_schema(schema);
        assert!(clean["items"].get("examples").is_none());
        assert_eq!(
            clean["items"]["properties"]["mode"],
            json!({ "type": "string", "enum": ["r", "w"] })
        );
    }

    #[test]
    fn non_object_passes_through() {
        assert_eq!(sanitize_schema(json!(true)), json!(true));
    }
}
