use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "thoughtline")]
#[command(version, about = "Stream reasoning chat responses to the terminal")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send one message and stream the response
    Send(SendArgs),

    /// Update persisted settings
    Configure(ConfigureArgs),
}

#[derive(Args)]
pub struct SendArgs {
    /// Message text
    pub message: String,

    /// Model name (defaults to the configured model)
    #[arg(long)]
    pub model: Option<String>,

    /// Existing chat to continue
    #[arg(long)]
    pub chat_id: Option<u64>,

    /// Print reasoning steps as they arrive
    #[arg(long)]
    pub show_reasoning: bool,
}

#[derive(Args)]
pub struct ConfigureArgs {
    /// Backend base URL
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Bearer token sent with every request
    #[arg(long)]
    pub api_key: Option<String>,

    /// Default model name
    #[arg(long)]
    pub model: Option<String>,

    /// Seconds to wait for the next chunk before failing
    #[arg(long)]
    pub idle_timeout_secs: Option<u64>,
}
