use clap::{
    CommandFactory, Parser, Subcommand,
    builder::{
        Styles,
        styling::{AnsiColor, Effects},
    },
};
use clap_complete::{Shell, generate};

use spotsearch::{cli, config, error};

fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::White.on_default() | Effects::BOLD)
        .usage(AnsiColor::White.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightBlue.on_default())
        .placeholder(AnsiColor::BrightGreen.on_default())
}

#[derive(Parser, Debug, Clone)]
#[clap(
  version = env!("CARGO_PKG_VERSION"),
  name=env!("CARGO_PKG_NAME"),
  bin_name=env!("CARGO_PKG_NAME"),
  about=env!("CARGO_PKG_DESCRIPTION"),
  styles=styles(),
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Authorize with Spotify API
    Auth(AuthOptions),

    /// Store the client id of your Spotify application
    ClientId(ClientIdOptions),

    /// Forget the stored tokens
    Disconnect,

    /// Show connection status
    Status,

    /// Print a valid access token
    Token,

    /// Search the tracks of a playlist
    Search(SearchOptions),

    /// Get shell completions
    Completions(CompletionsOption),
}

#[derive(Parser, Debug, Clone)]
pub struct AuthOptions {
    /// Client id to authorize with (defaults to the configured one)
    #[clap(long)]
    pub client_id: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct ClientIdOptions {
    pub client_id: String,
}

#[derive(Parser, Debug, Clone)]
pub struct SearchOptions {
    /// Playlist id or playlist URL
    pub playlist: String,

    /// Filter once and exit instead of prompting
    #[clap(long)]
    pub query: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct CompletionsOption {
    shell: Shell,
}

#[tokio::main]
async fn main() {
    if let Err(e) = config::load_env().await {
        error!("Cannot load environment. Err: {}", e);
    }

    let cli = Cli::parse();

    match cli.command {
        Command::Auth(opt) => cli::auth(opt.client_id).await,
        Command::ClientId(opt) => cli::set_client_id(opt.client_id).await,
        Command::Disconnect => cli::disconnect().await,
        Command::Status => cli::status().await,
        Command::Token => cli::token().await,
        Command::Search(opt) => cli::search(opt.playlist, opt.query).await,
        Command::Completions(opt) => {
            let mut cmd = Cli::command_for_update();
            let name = cmd.get_name().to_string();
            generate(opt.shell, &mut cmd, name, &mut std::io::stdout())
        }
    }
}
