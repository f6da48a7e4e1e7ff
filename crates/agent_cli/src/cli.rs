//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Invoke Amazon Bedrock agents with OpenTelemetry tracing
#[derive(Parser)]
#[command(name = "inline-agent", about, version, propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format: text (human-readable) or json (machine-readable)
    #[arg(short, long, global = true, default_value = "text")]
    pub output: OutputFormat,
}

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum OutputFormat {
    /// Colored terminal output for humans
    #[default]
    Text,
    /// Structured JSON for machine consumption
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the hello-world inline agent
    Hello {
        /// Bedrock foundation model id
        model_id: String,
    },
    /// Invoke the managed agent from AGENT_ID / AGENT_ALIAS_ID, observed
    Invoke {
        /// Prompt text (default: AGENT_PROMPT)
        #[arg(short, long)]
        prompt: Option<String>,
        /// Continue an existing session
        #[arg(long)]
        session_id: Option<String>,
        #[command(flatten)]
        traces: TraceArgs,
        /// Ask the agent to buffer the final response
        #[arg(long)]
        no_stream: bool,
    },
    /// Define an agent for this call and run its return-control loop, observed
    Inline {
        /// Foundation model id (default: FOUNDATION_MODEL)
        #[arg(short, long)]
        model: Option<String>,
        /// Agent instruction
        #[arg(short, long)]
        instruction: String,
        /// Prompt text
        #[arg(short, long)]
        prompt: String,
        /// Agent name
        #[arg(long, default_value = "inline-agent")]
        name: String,
        /// MCP servers TOML; every server becomes an action group
        #[arg(long)]
        mcp_config: Option<PathBuf>,
        /// Attach the code interpreter builtin
        #[arg(long)]
        code_interpreter: bool,
        /// Attach the user input builtin, answered on stdin
        #[arg(long)]
        user_input: bool,
        /// Maximum return-control rounds
        #[arg(long)]
        max_rounds: Option<u32>,
        #[command(flatten)]
        traces: TraceArgs,
    },
    /// Inspect and call MCP server tools
    Mcp {
        #[command(subcommand)]
        action: McpAction,
    },
    /// Saved trace captures
    Trace {
        #[command(subcommand)]
        action: TraceAction,
    },
}

#[derive(clap::Args, Clone, Debug, Default)]
pub struct TraceArgs {
    /// Print the trace capture after the invocation
    #[arg(long)]
    pub show_traces: bool,
    /// Save the trace capture as JSON
    #[arg(long)]
    pub save_traces: bool,
    /// Directory for saved captures
    #[arg(long)]
    pub trace_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum McpAction {
    /// List the tools of every configured server
    Tools {
        /// MCP servers TOML (default: ~/.config/inline-agent/mcp_servers.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Only this server
        #[arg(short, long)]
        server: Option<String>,
    },
    /// Call one MCP tool directly
    Call {
        /// Server id
        server: String,
        /// Tool name
        tool: String,
        /// JSON arguments
        #[arg(short, long, default_value = "{}")]
        args: String,
        /// MCP servers TOML (default: ~/.config/inline-agent/mcp_servers.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum TraceAction {
    /// Pretty-print a saved capture
    Show {
        /// Capture file
        file: PathBuf,
    },
}
