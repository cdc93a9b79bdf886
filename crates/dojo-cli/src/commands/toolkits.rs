//! `dojo toolkits` - List the toolkits that can be connected.

use console::style;
use dojo_core::models::ToolkitInfo;
use dojo_core::remote::DojoClient;

pub async fn list(
    client: &DojoClient,
    search: Option<&str>,
    category: Option<&str>,
) -> Result<(), String> {
    let toolkits = client
        .list_toolkits(search, category)
        .await
        .map_err(|e| e.to_string())?;
    print!("{}", format_toolkits(&toolkits));
    Ok(())
}

pub fn format_toolkits(toolkits: &[ToolkitInfo]) -> String {
    if toolkits.is_empty() {
        return "No toolkits match.\n".to_string();
    }
    let mut out = String::new();
    for toolkit in toolkits {
        out.push_str(&format!(
            "{:<16} {}\n",
            style(&toolkit.slug).bold(),
            toolkit.name
        ));
    }
    out.push_str(&format!("\n{} toolkit(s)\n", toolkits.len()));
    out
}
