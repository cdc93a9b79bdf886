//! `dojo connections` / `dojo disconnect` - Inspect and remove connections.

use console::style;
use dojo_core::models::{ConnectionInfo, ConnectionStatus};
use dojo_core::remote::DojoClient;

use super::print_data;

pub async fn list(client: &DojoClient, user_id: &str) -> Result<(), String> {
    let connections = client
        .user_connections(user_id)
        .await
        .map_err(|e| e.to_string())?;
    print!("{}", format_connections(&connections));
    Ok(())
}

pub async fn status(client: &DojoClient, connection_id: &str) -> Result<(), String> {
    let status = client
        .connection_status(connection_id)
        .await
        .map_err(|e| e.to_string())?;
    print_data(&status)
}

pub async fn disconnect(client: &DojoClient, connection_id: &str) -> Result<(), String> {
    client
        .disconnect(connection_id)
        .await
        .map_err(|e| e.to_string())?;
    println!("Disconnected {}", connection_id);
    Ok(())
}

pub fn format_connections(connections: &[ConnectionInfo]) -> String {
    if connections.is_empty() {
        return "No active connections.\n".to_string();
    }
    let mut out = String::new();
    for c in connections {
        let status = match c.status {
            ConnectionStatus::Active => style(c.status.as_str()).green(),
            ConnectionStatus::Pending => style(c.status.as_str()).yellow(),
            ConnectionStatus::Failed | ConnectionStatus::Expired => style(c.status.as_str()).red(),
        };
        let since = c
            .created_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        out.push_str(&format!("{:<16} {:<24} {} {}\n", c.app_type, c.connection_id, status, since));
    }
    out
}
