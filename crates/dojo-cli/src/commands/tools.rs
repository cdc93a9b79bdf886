//! `dojo tools` - Browse a toolkit's tools and their parameter schemas.

use clap::ValueEnum;
use console::style;
use dojo_core::models::ToolDefinition;
use dojo_core::remote::DojoClient;
use dojo_core::schema::SchemaView;

/// Which parameter block of a tool to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SchemaSide {
    Input,
    Output,
}

pub async fn list(client: &DojoClient, toolkit: &str) -> Result<(), String> {
    let tools = client
        .toolkit_tools(toolkit)
        .await
        .map_err(|e| e.to_string())?;
    print!("{}", format_tool_list(&tools));
    Ok(())
}

pub async fn show(
    client: &DojoClient,
    toolkit: &str,
    tool_slug: &str,
    side: SchemaSide,
    expand: &[String],
    expand_all: bool,
) -> Result<(), String> {
    let tools = client
        .toolkit_tools(toolkit)
        .await
        .map_err(|e| e.to_string())?;
    let tool = tools
        .iter()
        .find(|t| t.slug.eq_ignore_ascii_case(tool_slug))
        .ok_or_else(|| format!("Tool {} not found in {}", tool_slug, toolkit))?;
    print!("{}", render_tool(tool, side, expand, expand_all)?);
    Ok(())
}

pub fn format_tool_list(tools: &[ToolDefinition]) -> String {
    if tools.is_empty() {
        return "No tools found.\n".to_string();
    }
    let mut out = String::new();
    for tool in tools {
        out.push_str(&format!("{}  {}\n", style(&tool.slug).bold(), tool.name));
    }
    out
}

/// Header plus the collapsible parameter tree of one tool.
///
/// `expand` opens the named property paths along with their ancestors; an
/// unknown or non-expandable path is an error.
pub fn render_tool(
    tool: &ToolDefinition,
    side: SchemaSide,
    expand: &[String],
    expand_all: bool,
) -> Result<String, String> {
    let schema = match side {
        SchemaSide::Input => &tool.input_parameters,
        SchemaSide::Output => &tool.output_parameters,
    };

    let mut view = SchemaView::for_tool_schema(schema);
    if expand_all {
        view.expand_all();
    }
    for display in expand {
        let revealed = view
            .resolve(display)
            .is_some_and(|path| view.reveal(&path));
        if !revealed {
            return Err(format!("No expandable property at '{}'", display));
        }
    }

    let mut out = format!("{} ({})\n", style(&tool.name).bold(), tool.slug);
    if !tool.description.is_empty() {
        out.push_str(&tool.description);
        out.push('\n');
    }
    out.push('\n');
    if view.is_empty() {
        out.push_str("No parameters.\n");
    } else {
        out.push_str(&view.render_text());
    }
    Ok(out)
}
