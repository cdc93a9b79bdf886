//! Collapsible projection of a parameter schema.
//!
//! A [`SchemaView`] walks a schema tree and produces the rows that are
//! currently visible. The root level is expanded; every nested level starts
//! collapsed until toggled. Expansion state is keyed by property path, the
//! list of property names from the root down, so names containing `.` never
//! share state with a nested property. Rows also carry a display path
//! (`parent.child`, with `[]` marking a step into array items).

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use super::{SchemaProperty, ToolSchema};

/// One visible line of the rendered tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaRow {
    pub path: String,
    pub segments: Vec<String>,
    pub name: String,
    pub level: usize,
    pub display_type: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
    pub expandable: bool,
    pub expanded: bool,
}

/// Expand/collapse state over one borrowed schema.
#[derive(Debug, Clone)]
pub struct SchemaView<'a> {
    properties: Option<&'a IndexMap<String, SchemaProperty>>,
    required: &'a [String],
    expanded: HashMap<Vec<String>, bool>,
}

/// Initial state of a nested renderer at `level`.
fn expanded_by_default(level: usize) -> bool {
    level == 0
}

fn child_path(parent: &str, name: &str, through_items: bool) -> String {
    let mut path = String::with_capacity(parent.len() + name.len() + 3);
    path.push_str(parent);
    if through_items {
        path.push_str("[]");
    }
    if !path.is_empty() {
        path.push('.');
    }
    path.push_str(name);
    path
}

impl<'a> SchemaView<'a> {
    /// View over a tool's top-level parameter block.
    pub fn for_tool_schema(schema: &'a ToolSchema) -> Self {
        Self {
            properties: Some(&schema.properties),
            required: &schema.required,
            expanded: HashMap::new(),
        }
    }

    /// View over an arbitrary (possibly absent) schema node. Only the node's
    /// children are listed; a leaf or missing schema renders no rows.
    pub fn for_property(schema: Option<&'a SchemaProperty>) -> Self {
        let (properties, required) = match schema.and_then(|s| s.children()) {
            Some((props, required)) => (Some(props), required),
            None => (None, &[][..]),
        };
        Self {
            properties,
            required,
            expanded: HashMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.properties.map_or(true, |p| p.is_empty())
    }

    /// Whether the nested renderer under `path` is open.
    pub fn is_expanded(&self, path: &[String]) -> bool {
        self.expanded
            .get(path)
            .copied()
            .unwrap_or_else(|| expanded_by_default(path.len()))
    }

    /// Flip one property. Returns the new state, or `None` when the path
    /// does not name an expandable property.
    pub fn toggle(&mut self, path: &[String]) -> Option<bool> {
        self.find(path).filter(|p| p.is_expandable())?;
        let next = !self.is_expanded(path);
        self.expanded.insert(path.to_vec(), next);
        Some(next)
    }

    /// Open `path` and every property above it so its children are visible.
    /// Returns `false`, changing nothing, when `path` is not expandable.
    pub fn reveal(&mut self, path: &[String]) -> bool {
        if !self.find(path).is_some_and(|p| p.is_expandable()) {
            return false;
        }
        for end in 1..=path.len() {
            self.expanded.insert(path[..end].to_vec(), true);
        }
        true
    }

    pub fn expand_all(&mut self) {
        let mut paths = Vec::new();
        if let Some(props) = self.properties {
            collect_expandable(props, &[], &mut paths);
        }
        for path in paths {
            self.expanded.insert(path, true);
        }
    }

    pub fn collapse_all(&mut self) {
        self.expanded.clear();
    }

    /// Resolve a property by path.
    pub fn find(&self, path: &[String]) -> Option<&'a SchemaProperty> {
        let mut props = self.properties?;
        let mut found: Option<&'a SchemaProperty> = None;
        for name in path {
            if let Some(parent) = found {
                props = parent.children()?.0;
            }
            found = Some(props.get(name)?);
        }
        found
    }

    /// Parse a display path such as `body.text` or `attendees[].email`
    /// against the schema. When a name containing `.` competes with a nested
    /// path, the longest matching name wins.
    pub fn resolve(&self, display: &str) -> Option<Vec<String>> {
        let mut path = Vec::new();
        resolve_in(self.properties?, display, &mut path).then_some(path)
    }

    /// Visible rows in display order.
    pub fn rows(&self) -> Vec<SchemaRow> {
        let mut rows = Vec::new();
        if let Some(props) = self.properties {
            self.push_rows(props, self.required, &[], "", false, &mut rows);
        }
        rows
    }

    fn push_rows(
        &self,
        props: &'a IndexMap<String, SchemaProperty>,
        required: &[String],
        parent: &[String],
        parent_display: &str,
        through_items: bool,
        rows: &mut Vec<SchemaRow>,
    ) {
        for (name, prop) in props {
            let mut segments = parent.to_vec();
            segments.push(name.clone());
            let path = child_path(parent_display, name, through_items);
            let expandable = prop.is_expandable();
            let expanded = expandable && self.is_expanded(&segments);

            rows.push(SchemaRow {
                path: path.clone(),
                segments: segments.clone(),
                name: name.clone(),
                level: parent.len(),
                display_type: prop.display_type(),
                required: required.contains(name) || prop.is_flagged_required(),
                description: prop.description.clone(),
                default: prop.default.clone(),
                examples: prop.examples.clone(),
                enum_values: prop.enum_values.clone(),
                expandable,
                expanded,
            });

            if expanded {
                if let Some((children, child_required)) = prop.children() {
                    let via_items = prop.is_type("array");
                    self.push_rows(children, child_required, &segments, &path, via_items, rows);
                }
            }
        }
    }

    /// Plain-text tree used by terminal clients.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for row in self.rows() {
            let marker = match (row.expandable, row.expanded) {
                (true, true) => "▾",
                (true, false) => "▸",
                (false, _) => "•",
            };
            out.push_str(&"  ".repeat(row.level));
            out.push_str(marker);
            out.push(' ');
            out.push_str(&row.name);
            out.push_str(": ");
            out.push_str(&row.display_type);
            if row.required {
                out.push_str(" (required)");
            }
            if let Some(desc) = &row.description {
                out.push_str(" - ");
                out.push_str(desc);
            }
            if let Some(default) = &row.default {
                out.push_str(&format!(" [default: {}]", default));
            }
            if let Some(values) = &row.enum_values {
                let joined: Vec<String> = values.iter().map(Value::to_string).collect();
                out.push_str(&format!(" [one of: {}]", joined.join(", ")));
            }
            out.push('\n');
        }
        out
    }
}

fn collect_expandable(
    props: &IndexMap<String, SchemaProperty>,
    parent: &[String],
    out: &mut Vec<Vec<String>>,
) {
    for (name, prop) in props {
        if let Some((children, _)) = prop.children() {
            let mut path = parent.to_vec();
            path.push(name.clone());
            collect_expandable(children, &path, out);
            out.push(path);
        }
    }
}

fn resolve_in(props: &IndexMap<String, SchemaProperty>, rest: &str, out: &mut Vec<String>) -> bool {
    let mut candidates: Vec<_> = props
        .iter()
        .filter(|(name, _)| rest.starts_with(name.as_str()))
        .collect();
    candidates.sort_by_key(|(name, _)| std::cmp::Reverse(name.len()));

    for (name, prop) in candidates {
        let tail = &rest[name.len()..];
        let through_items = prop.is_type("array");
        if tail.is_empty() || (through_items && tail == "[]") {
            out.push(name.clone());
            return true;
        }
        let sep = if through_items { "[]." } else { "." };
        let (Some(tail), Some((children, _))) = (tail.strip_prefix(sep), prop.children()) else {
            continue;
        };
        out.push(name.clone());
        if resolve_in(children, tail, out) {
            return true;
        }
        out.pop();
    }
    false
}
