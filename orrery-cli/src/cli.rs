use clap::{Parser, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "orrery",
    version,
    about = "Autonomous agent runtime over MCP tool servers"
)]
pub struct Cli {
    /// Configuration file (defaults to config/orrery.toml)
    #[arg(long)]
    pub config: Option<String>,
    /// JSON file the agent is restored from and saved to
    #[arg(long)]
    pub agent_state: Option<String>,
    #[arg(long, value_enum, default_value_t = RunMode::Stdio)]
    pub mode: RunMode,
    /// Sender name used for prompts given on the command line
    #[arg(long, default_value = "user")]
    pub sender: String,
    #[arg()]
    pub prompt: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RunMode {
    /// JSON-lines session on stdin/stdout
    Stdio,
    /// Print server status and the discovered catalog, then exit
    Tools,
    /// Deliver the positional prompt to the inbox, think once, print the reply
    Once,
}
