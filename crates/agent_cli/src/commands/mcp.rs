//! `inline-agent mcp`: inspect MCP servers without an agent.

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use inline_agent_toolbus::{McpClient, McpServerConfig, McpServersConfig};
use serde_json::{Value as JsonValue, json};

use crate::cli::McpAction;
use crate::output;

/// Default MCP configuration path.
fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("inline-agent")
        .join("mcp_servers.toml")
}

fn load(path: Option<PathBuf>) -> Result<McpServersConfig> {
    let path = path.unwrap_or_else(default_config_path);
    McpServersConfig::load(&path).with_context(|| format!("loading {}", path.display()))
}

pub async fn handle(action: McpAction) -> Result<()> {
    match action {
        McpAction::Tools { config, server } => {
            let servers = load(config)?;
            list_tools(&servers, server.as_deref()).await
        }
        McpAction::Call {
            server,
            tool,
            args,
            config,
        } => {
            let servers = load(config)?;
            let server = servers
                .get(&server)
                .ok_or_else(|| anyhow!("Server not found: {server}"))?;
            call_tool(server, &tool, &args).await
        }
    }
}

/// Servers selected by `filter`, or all of them.
fn select<'a>(servers: &'a McpServersConfig, filter: Option<&str>) -> Result<Vec<&'a McpServerConfig>> {
    match filter {
        Some(id) => servers
            .get(id)
            .map(|server| vec![server])
            .ok_or_else(|| anyhow!("Server not found: {id}")),
        None => Ok(servers.servers.iter().collect()),
    }
}

async fn list_tools(servers: &McpServersConfig, filter: Option<&str>) -> Result<()> {
    let selected = select(servers, filter)?;
    if selected.is_empty() {
        output::warning("No MCP servers configured.");
        output::dim(&format!("Add [[servers]] entries to {}", default_config_path().display()));
        return Ok(());
    }

    let mut table = output::table();
    output::table_header(&mut table, &["Server", "Tool", "Description"]);
    let mut items = Vec::new();

    for server in selected {
        let spinner = output::spinner(&format!("Connecting to {}...", server.display_name()));
        let mut client = match McpClient::start(server).await {
            Ok(client) => client,
            Err(e) => {
                output::spinner_error(&spinner, &format!("{}: {e}", server.id));
                continue;
            }
        };
        let tools = client.list_tools().await;
        if let Err(e) = client.shutdown().await {
            output::verbose(&format!("{}: shutdown failed: {e}", server.id));
        }

        match tools {
            Ok(tools) => {
                output::spinner_success(&spinner, &format!("{}: {} tools", server.id, tools.len()));
                for tool in tools {
                    let summary = tool.description.lines().next().unwrap_or("");
                    output::table_row(&mut table, &server.id, &[tool.name.as_str(), summary]);
                    items.push(json!({
                        "server": server.id,
                        "name": tool.name,
                        "description": tool.description,
                        "inputSchema": tool.input_schema,
                    }));
                }
            }
            Err(e) => output::spinner_error(&spinner, &format!("{}: {e}", server.id)),
        }
    }

    output::table_print(&table, &items);
    Ok(())
}

async fn call_tool(server: &McpServerConfig, tool: &str, args: &str) -> Result<()> {
    let arguments: JsonValue =
        serde_json::from_str(args).map_err(|e| anyhow!("Invalid JSON arguments: {e}"))?;

    let spinner = output::spinner(&format!("Calling {}/{}...", server.id, tool));
    let mut client = McpClient::start(server).await?;
    let result = client.call_tool(tool, arguments).await;
    if let Err(e) = client.shutdown().await {
        output::verbose(&format!("{}: shutdown failed: {e}", server.id));
    }
    let result = result?;

    if result.is_error {
        output::spinner_error(&spinner, &format!("{tool} reported an error"));
        return Err(anyhow!("{}", result.text()));
    }
    output::spinner_success(&spinner, &format!("{tool} completed"));
    match &result.structured_content {
        Some(value) => output::json_pretty(value),
        None if output::is_json() => output::json_pretty(&json!({ "text": result.text() })),
        None => println!("{}", result.text()),
    }
    Ok(())
}
