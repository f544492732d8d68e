//! Function-calling schema translation
//!
//! Tool descriptors come from the tool server in MCP form
//! (`name`, `description`, `inputSchema`). Model endpoints want them in one
//! of two function-calling dialects:
//!
//! - [`SchemaDialect::ToolCalls`]: OpenAI-style
//!   `{"type": "function", "function": {name, description, parameters}}`,
//!   parameters passed through untouched
//! - [`SchemaDialect::ContentParts`]: Gemini-style function declarations
//!   `{name, description, parameters}`, with `$schema` and
//!   `additionalProperties` stripped at every schema level because the
//!   endpoint rejects them
//!
//! Translation only renames fields. Name and description survive verbatim
//! and parameters survive up to [`sanitize_parameters`].

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::mcp::ToolDescriptor;

/// Keys some model endpoints refuse inside a parameter schema
const STRIPPED_KEYS: [&str; 2] = ["$schema", "additionalProperties"];

/// Function-calling dialect of a model endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchemaDialect {
    /// Tool calls on the assistant message, results under role `tool`
    #[default]
    #[serde(rename = "openai", alias = "tool_calls")]
    ToolCalls,
    /// Function calls and results as parts of the content list
    #[serde(rename = "gemini", alias = "content_parts")]
    ContentParts,
}

impl FromStr for SchemaDialect {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "openai" | "tool_calls" | "tool-calls" => Ok(SchemaDialect::ToolCalls),
            "gemini" | "content_parts" | "content-parts" => Ok(SchemaDialect::ContentParts),
            _ => Err(Error::Config(format!(
                "Invalid model dialect: {}. Valid options: openai, gemini",
                s
            ))),
        }
    }
}

impl fmt::Display for SchemaDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaDialect::ToolCalls => write!(f, "openai"),
            SchemaDialect::ContentParts => write!(f, "gemini"),
        }
    }
}

/// Strip endpoint-hostile keywords from a JSON schema, recursively.
///
/// Only schema positions are walked (`properties`, `items`, combinators,
/// definitions), so a parameter that happens to be called
/// `additionalProperties` is kept.
pub fn sanitize_parameters(schema: &Value) -> Value {
    let Value::Object(node) = schema else {
        return schema.clone();
    };

    let mut out = Map::with_capacity(node.len());
    for (key, value) in node {
        if STRIPPED_KEYS.contains(&key.as_str()) {
            continue;
        }
        let value = match key.as_str() {
            "properties" | "$defs" | "definitions" | "patternProperties" => match value {
                Value::Object(props) => Value::Object(
                    props
                        .iter()
                        .map(|(name, sub)| (name.clone(), sanitize_parameters(sub)))
                        .collect(),
                ),
                other => other.clone(),
            },
            "items" | "not" => match value {
                Value::Array(items) => Value::Array(items.iter().map(sanitize_parameters).collect()),
                other => sanitize_parameters(other),
            },
            "anyOf" | "oneOf" | "allOf" => match value {
                Value::Array(items) => Value::Array(items.iter().map(sanitize_parameters).collect()),
                other => other.clone(),
            },
            _ => value.clone(),
        };
        out.insert(key.clone(), value);
    }
    Value::Object(out)
}

/// Translate one descriptor into the dialect's function schema
pub fn to_function_schema(tool: &ToolDescriptor, dialect: SchemaDialect) -> Value {
    match dialect {
        SchemaDialect::ToolCalls => json!({
            "type": "function",
            "function": {
                "name": tool.name,
                "description": tool.description,
                "parameters": tool.input_schema,
            }
        }),
        SchemaDialect::ContentParts => json!({
            "name": tool.name,
            "description": tool.description,
            "parameters": sanitize_parameters(&tool.input_schema),
        }),
    }
}

/// Translate every descriptor, in order
pub fn to_function_schemas(tools: &[ToolDescriptor], dialect: SchemaDialect) -> Vec<Value> {
    tools.iter().map(|t| to_function_schema(t, dialect)).collect()
}

/// Wrap translated schemas the way the endpoint expects its `tools` field
pub fn tools_payload(schemas: &[Value], dialect: SchemaDialect) -> Value {
    match dialect {
        SchemaDialect::ToolCalls => Value::Array(schemas.to_vec()),
        SchemaDialect::ContentParts => json!([{ "functionDeclarations": schemas }]),
    }
}

/// Translate a dialect function schema back into a descriptor
pub fn from_function_schema(schema: &Value, dialect: SchemaDialect) -> Result<ToolDescriptor> {
    let function = match dialect {
        SchemaDialect::ToolCalls => schema.get("function").ok_or_else(|| {
            Error::ModelEndpoint("function schema has no 'function' object".to_string())
        })?,
        SchemaDialect::ContentParts => schema,
    };

    let name = function
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::ModelEndpoint("function schema has no name".to_string()))?;

    Ok(ToolDescriptor {
        name: name.to_string(),
        description: function
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        input_schema: function
            .get("parameters")
            .cloned()
            .unwrap_or_else(|| json!({ "type": "object", "properties": {} })),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIALECTS: [SchemaDialect; 2] = [SchemaDialect::ToolCalls, SchemaDialect::ContentParts];

    fn browser_tools() -> Vec<ToolDescriptor> {
        vec![
            ToolDescriptor {
                name: "browser_navigate".into(),
                description: "Navigate to a URL".into(),
                input_schema: json!({
                    "$schema": "http://json-schema.org/draft-07/schema#",
                    "type": "object",
                    "properties": {"url": {"type": "string", "description": "The URL"}},
                    "required": ["url"],
                    "additionalProperties": false
                }),
            },
            ToolDescriptor {
                name: "browser_fill_form".into(),
                description: "".into(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "fields": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "ref": {"type": "string"},
                                    "additionalProperties": {"type": "boolean"}
                                },
                                "additionalProperties": false
                            }
                        }
                    }
                }),
            },
        ]
    }

    #[test]
    fn test_translation_preserves_fields_across_dialects() {
        for tool in browser_tools() {
            for a in DIALECTS {
                for b in DIALECTS {
                    let via_a = from_function_schema(&to_function_schema(&tool, a), a).unwrap();
                    let via_b = from_function_schema(&to_function_schema(&via_a, b), b).unwrap();

                    assert_eq!(via_b.name, tool.name);
                    assert_eq!(via_b.description, tool.description);
                    assert_eq!(
                        sanitize_parameters(&via_b.input_schema),
                        sanitize_parameters(&tool.input_schema),
                        "{} via {} then {}",
                        tool.name,
                        a,
                        b
                    );
                }
            }
        }
    }

    #[test]
    fn test_tool_calls_keeps_schema_verbatim() {
        let tool = &browser_tools()[0];
        let schema = to_function_schema(tool, SchemaDialect::ToolCalls);
        assert_eq!(schema["type"], "function");
        assert_eq!(schema["function"]["parameters"], tool.input_schema);
    }

    #[test]
    fn test_content_parts_strips_nested_metadata() {
        let tool = &browser_tools()[1];
        let schema = to_function_schema(tool, SchemaDialect::ContentParts);
        let item = &schema["parameters"]["properties"]["fields"]["items"];

        assert!(item.get("additionalProperties").is_none());
        // A parameter that is merely named like the keyword survives
        assert_eq!(item["properties"]["additionalProperties"]["type"], "boolean");

        let top = &to_function_schema(&browser_tools()[0], SchemaDialect::ContentParts)["parameters"];
        assert!(top.get("$schema").is_none());
        assert_eq!(top["required"], json!(["url"]));
    }

    #[test]
    fn test_tools_payload_shapes() {
        let schemas = to_function_schemas(&browser_tools(), SchemaDialect::ContentParts);
        let payload = tools_payload(&schemas, SchemaDialect::ContentParts);
        assert_eq!(payload[0]["functionDeclarations"].as_array().unwrap().len(), 2);

        let schemas = to_function_schemas(&browser_tools(), SchemaDialect::ToolCalls);
        let payload = tools_payload(&schemas, SchemaDialect::ToolCalls);
        assert_eq!(payload.as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_dialect_parsing() {
        assert_eq!("OpenAI".parse::<SchemaDialect>().unwrap(), SchemaDialect::ToolCalls);
        assert_eq!("gemini".parse::<SchemaDialect>().unwrap(), SchemaDialect::ContentParts);
        assert!("claude".parse::<SchemaDialect>().is_err());
    }
}
