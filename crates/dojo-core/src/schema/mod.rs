//! JSON-Schema-like parameter descriptions for Composio tools.
//!
//! Tool definitions carry their `input_parameters` / `output_parameters` as
//! loosely-typed JSON Schema fragments. This module parses them leniently
//! into [`SchemaProperty`] trees (a malformed field degrades to "absent"
//! instead of failing the whole tool) and classifies each node as a
//! [`SchemaKind`] for the renderer in [`render`].

pub mod render;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use render::{SchemaRow, SchemaView};

/// The `type` keyword: a single type name or a list of alternatives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SchemaType {
    Single(String),
    Multiple(Vec<String>),
}

/// The `required` keyword: a list of child names on object schemas, or a
/// boolean flag on the property itself (Composio emits both forms).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Required {
    Flag(bool),
    Fields(Vec<String>),
}

/// One node of a parameter schema tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value")]
pub struct SchemaProperty {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<SchemaType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<Value>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<IndexMap<String, SchemaProperty>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<SchemaProperty>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Required>,
}

/// Structural classification used by the renderer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SchemaKind<'a> {
    Leaf,
    Object {
        properties: &'a IndexMap<String, SchemaProperty>,
        required: &'a [String],
    },
    Array {
        items: &'a SchemaProperty,
    },
}

impl From<Value> for SchemaProperty {
    fn from(value: Value) -> Self {
        Self::from_json(&value)
    }
}

impl SchemaProperty {
    /// Parse a schema node, ignoring fields of the wrong shape.
    pub fn from_json(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::default();
        };

        let schema_type = match obj.get("type") {
            Some(Value::String(s)) => Some(SchemaType::Single(s.clone())),
            Some(Value::Array(list)) => {
                let names: Vec<String> = list
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect();
                (!names.is_empty()).then_some(SchemaType::Multiple(names))
            }
            _ => None,
        };

        let properties = obj.get("properties").and_then(Value::as_object).map(|props| {
            props
                .iter()
                .map(|(name, child)| (name.clone(), Self::from_json(child)))
                .collect::<IndexMap<_, _>>()
        });

        let required = match obj.get("required") {
            Some(Value::Bool(b)) => Some(Required::Flag(*b)),
            Some(Value::Array(list)) => Some(Required::Fields(
                list.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect(),
            )),
            _ => None,
        };

        let examples = match obj.get("examples") {
            Some(Value::Array(list)) => list.clone(),
            Some(Value::Null) | None => Vec::new(),
            Some(single) => vec![single.clone()],
        };

        Self {
            schema_type,
            title: obj.get("title").and_then(Value::as_str).map(str::to_string),
            description: obj
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_string),
            default: obj.get("default").filter(|v| !v.is_null()).cloned(),
            examples,
            enum_values: obj.get("enum").and_then(Value::as_array).cloned(),
            properties,
            items: obj
                .get("items")
                .filter(|v| v.is_object())
                .map(|v| Box::new(Self::from_json(v))),
            required,
        }
    }

    /// True when `type` is exactly the given single type name.
    pub fn is_type(&self, name: &str) -> bool {
        matches!(&self.schema_type, Some(SchemaType::Single(t)) if t == name)
    }

    fn has_properties(&self) -> bool {
        self.properties.as_ref().is_some_and(|p| !p.is_empty())
    }

    pub fn kind(&self) -> SchemaKind<'_> {
        if self.is_type("object") && self.has_properties() {
            if let Some(properties) = &self.properties {
                return SchemaKind::Object {
                    properties,
                    required: self.required_fields(),
                };
            }
        }
        if self.is_type("array") {
            if let Some(items) = self.items.as_deref().filter(|i| i.has_properties()) {
                return SchemaKind::Array { items };
            }
        }
        SchemaKind::Leaf
    }

    pub fn is_expandable(&self) -> bool {
        !matches!(self.kind(), SchemaKind::Leaf)
    }

    /// Child properties revealed by expanding this node, with the list of
    /// required child names at that level.
    pub fn children(&self) -> Option<(&IndexMap<String, SchemaProperty>, &[String])> {
        match self.kind() {
            SchemaKind::Leaf => None,
            SchemaKind::Object {
                properties,
                required,
            } => Some((properties, required)),
            SchemaKind::Array { items } => items
                .properties
                .as_ref()
                .map(|props| (props, items.required_fields())),
        }
    }

    /// Names listed in an object-level `required` array.
    pub fn required_fields(&self) -> &[String] {
        match &self.required {
            Some(Required::Fields(fields)) => fields,
            _ => &[],
        }
    }

    /// `required: true` set on the property itself.
    pub fn is_flagged_required(&self) -> bool {
        matches!(self.required, Some(Required::Flag(true)))
    }

    /// Human-readable type: `array<T>` for arrays, `A | B` for unions.
    pub fn display_type(&self) -> String {
        match &self.schema_type {
            None => "any".to_string(),
            Some(SchemaType::Multiple(types)) => types.join(" | "),
            Some(SchemaType::Single(t)) if t == "array" => match &self.items {
                Some(items) if items.schema_type.is_some() => {
                    format!("array<{}>", items.display_type())
                }
                _ => "array".to_string(),
            },
            Some(SchemaType::Single(t)) => t.clone(),
        }
    }
}

/// Top-level `input_parameters` / `output_parameters` block of a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value")]
pub struct ToolSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    pub properties: IndexMap<String, SchemaProperty>,
    pub required: Vec<String>,
}

impl Default for ToolSchema {
    fn default() -> Self {
        Self {
            schema_type: "object".to_string(),
            properties: IndexMap::new(),
            required: Vec::new(),
        }
    }
}

impl From<Value> for ToolSchema {
    fn from(value: Value) -> Self {
        let root = SchemaProperty::from_json(&value);
        let schema_type = match root.schema_type {
            Some(SchemaType::Single(t)) => t,
            _ => "object".to_string(),
        };
        let required = match root.required {
            Some(Required::Fields(fields)) => fields,
            _ => Vec::new(),
        };
        Self {
            schema_type,
            properties: root.properties.unwrap_or_default(),
            required,
        }
    }
}

impl ToolSchema {
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_array_of_scalars_is_not_expandable() {
        let schema: SchemaProperty =
            serde_json::from_value(json!({"type": "array", "items": {"type": "string"}})).unwrap();
        assert_eq!(schema.display_type(), "array<string>");
        assert!(!schema.is_expandable());
        assert!(schema.children().is_none());
    }

    #[test]
    fn test_array_of_objects_expands_into_item_properties() {
        let schema = SchemaProperty::from_json(&json!({
            "type": "array",
            "items": {
                "type": "object",
                "properties": {"email": {"type": "string"}},
                "required": ["email"]
            }
        }));
        assert_eq!(schema.display_type(), "array<object>");
        let (props, required) = schema.children().unwrap();
        assert!(props.contains_key("email"));
        assert_eq!(required, ["email".to_string()]);
    }

    #[test]
    fn test_multi_type_and_missing_type() {
        let schema = SchemaProperty::from_json(&json!({"type": ["string", "null"]}));
        assert_eq!(schema.display_type(), "string | null");
        assert!(!schema.is_expandable());
        assert_eq!(SchemaProperty::from_json(&json!({})).display_type(), "any");
        assert_eq!(
            SchemaProperty::from_json(&json!({"type": "array"})).display_type(),
            "array"
        );
    }

    #[test]
    fn test_object_without_properties_is_a_leaf() {
        let schema = SchemaProperty::from_json(&json!({"type": "object", "properties": {}}));
        assert_eq!(schema.kind(), SchemaKind::Leaf);
    }

    #[test]
    fn test_lenient_parsing_drops_malformed_fields() {
        let schema = SchemaProperty::from_json(&json!({
            "type": 42,
            "description": ["not", "a", "string"],
            "examples": "inbox",
            "required": true,
            "items": "nope"
        }));
        assert!(schema.schema_type.is_none());
        assert!(schema.description.is_none());
        assert_eq!(schema.examples, vec![json!("inbox")]);
        assert!(schema.is_flagged_required());
        assert!(schema.items.is_none());
    }

    #[test]
    fn test_tool_schema_preserves_property_order() {
        let schema: ToolSchema = serde_json::from_value(json!({
            "properties": {
                "zeta": {"type": "string"},
                "alpha": {"type": "integer"},
                "mid": {"type": "boolean"}
            },
            "required": ["alpha", 3]
        }))
        .unwrap();
        assert_eq!(schema.schema_type, "object");
        let names: Vec<&str> = schema.properties.keys().map(String::as_str).collect();
        assert_eq!(names, ["zeta", "alpha", "mid"]);
        assert_eq!(schema.required, ["alpha".to_string()]);
    }

    #[test]
    fn test_tool_schema_from_non_object_is_empty() {
        let schema: ToolSchema = serde_json::from_value(json!(null)).unwrap();
        assert_eq!(schema, ToolSchema::default());
        assert!(schema.is_empty());
    }
}
