//! CLI command implementations.
//!
//! `server` runs the backend in-process. Every other command talks to a
//! running server through [`DojoClient`], the same HTTP API the web UI uses.

pub mod connect;
pub mod connections;
pub mod execute;
pub mod server;
pub mod toolkits;
pub mod tools;

use dojo_core::remote::DojoClient;

/// Build a client for the Dojo server at `server_url`.
pub fn client(server_url: &str) -> Result<DojoClient, String> {
    tracing::debug!("Using Dojo server at {}", server_url);
    DojoClient::new(server_url).map_err(|e| format!("Failed to create client: {}", e))
}

/// Pretty-print a JSON value to stdout.
pub fn print_json(value: &serde_json::Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
    );
}

/// Serialize and pretty-print any response payload.
pub fn print_data<T: serde::Serialize>(data: &T) -> Result<(), String> {
    let value = serde_json::to_value(data).map_err(|e| format!("Failed to serialize: {}", e))?;
    print_json(&value);
    Ok(())
}
