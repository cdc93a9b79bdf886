//! `dojo server` - Start the Agent Dojo HTTP backend server.

use dojo_core::composio::ComposioConfig;

pub async fn run(
    host: String,
    port: u16,
    db_path: String,
    composio: Option<ComposioConfig>,
    static_dir: Option<String>,
) -> Result<(), String> {
    let config = dojo_server::ServerConfig {
        host: host.clone(),
        port,
        db_path,
        composio,
        static_dir,
    };

    println!("Starting Agent Dojo server on {}:{}...", host, port);

    let addr = dojo_server::start_server(config).await?;
    println!("Agent Dojo server listening on http://{}", addr);

    // Keep the process running until interrupted
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("Failed to listen for Ctrl+C: {}", e))?;

    println!("\nShutting down...");
    Ok(())
}
