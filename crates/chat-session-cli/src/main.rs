use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

mod commands;

/// Chat session CLI — sign in to the chat API gateway from a terminal
#[derive(Parser)]
#[command(name = "chat-session", version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Base URL of the API gateway
    #[arg(long, global = true, env = "CHAT_API_URL")]
    api_url: Option<String>,

    /// Request timeout in seconds (no timeout when omitted)
    #[arg(long, global = true, env = "CHAT_API_TIMEOUT_SECS")]
    timeout: Option<u64>,

    /// Session file (defaults to ~/.chat-session/session.json)
    #[arg(long, global = true, env = "CHAT_SESSION_STORE")]
    store: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with email and password
    Login(commands::login::LoginArgs),

    /// Create an account and sign in
    Register(commands::register::RegisterArgs),

    /// Sign out of this device
    Logout,

    /// Sign out of every device
    LogoutAll,

    /// Show the current session
    Status,

    /// Replace the access token using the refresh token
    Refresh,

    /// Update the signed-in user's profile
    Profile(commands::profile::ProfileArgs),
}

#[tokio::main]
async fn main() {
    chat_session::env::init_logger();
    let cli = Cli::parse();

    let result = match commands::Context::open(&cli.global).await {
        Ok(ctx) => match cli.command {
            Commands::Login(args) => commands::login::run(&ctx, args).await,
            Commands::Register(args) => commands::register::run(&ctx, args).await,
            Commands::Logout => commands::logout::run(&ctx, false).await,
            Commands::LogoutAll => commands::logout::run(&ctx, true).await,
            Commands::Status => commands::status::run(&ctx).await,
            Commands::Refresh => commands::refresh::run(&ctx).await,
            Commands::Profile(args) => commands::profile::run(&ctx, args).await,
        },
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("{} {}", colored::Colorize::red("error:"), e);
        std::process::exit(1);
    }
}
