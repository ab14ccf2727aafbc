pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "pathgate")]
#[command(about = "pathgate - filesystem-shaped routes behind a token gate")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the HTTP server")]
    Serve {
        #[arg(long, help = "Bind address (overrides SERVER_HOST)")]
        host: Option<String>,
        #[arg(long, help = "Bind port (overrides SERVER_PORT)")]
        port: Option<u16>,
    },

    #[command(about = "Build and print the dispatch table")]
    Routes,

    #[command(about = "Print the generated OpenAPI document")]
    Openapi,

    #[command(about = "Mint tokens with the configured signing key")]
    Token {
        #[command(subcommand)]
        cmd: commands::token::TokenCommands,
    },

    #[command(about = "Hash, verify and generate secrets")]
    Secret {
        #[command(subcommand)]
        cmd: commands::secret::SecretCommands,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Serve { host, port } => commands::serve::handle(host, port).await,
        Commands::Routes => commands::routes::handle(output_format),
        Commands::Openapi => commands::openapi::handle(),
        Commands::Token { cmd } => commands::token::handle(cmd, output_format),
        Commands::Secret { cmd } => commands::secret::handle(cmd, output_format).await,
    }
}
