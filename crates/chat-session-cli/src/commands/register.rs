// `chat-session register` — create an account and sign in.

use clap::Args;
use colored::Colorize;

use super::{prompt_password, CommandResult, Context};

#[derive(Args)]
pub struct RegisterArgs {
    /// Account email
    email: String,

    /// Name shown to other users
    #[arg(long)]
    display_name: String,

    /// Password (prompted for, with confirmation, when omitted)
    #[arg(long, env = "CHAT_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

pub async fn run(ctx: &Context, args: RegisterArgs) -> CommandResult {
    let password = match args.password {
        Some(p) => p,
        None => prompt_password(true)?,
    };

    let user = ctx
        .session
        .register(&args.email, &args.display_name, &password)
        .await?;

    println!();
    println!(
        "{} Account created for {} <{}>",
        "✓".green(),
        user.display_name.bold(),
        user.email
    );
    Ok(())
}
