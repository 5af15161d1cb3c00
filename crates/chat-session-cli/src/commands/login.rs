// `chat-session login` — sign in with email and password.

use clap::Args;
use colored::Colorize;

use super::{prompt_password, CommandResult, Context};

#[derive(Args)]
pub struct LoginArgs {
    /// Account email
    email: String,

    /// Password (prompted for when omitted)
    #[arg(long, env = "CHAT_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Sign in again even if a session is already active
    #[arg(long)]
    force: bool,
}

pub async fn run(ctx: &Context, args: LoginArgs) -> CommandResult {
    if let Some(current) = ctx.session.user() {
        if !args.force {
            let reauth = dialoguer::Confirm::new()
                .with_prompt(format!(
                    "Already signed in as {}. Sign in again?",
                    current.email
                ))
                .default(false)
                .interact()?;

            if !reauth {
                println!("Login cancelled.");
                return Ok(());
            }
        }
    }

    let password = match args.password {
        Some(p) => p,
        None => prompt_password(false)?,
    };

    let user = ctx.session.login(&args.email, &password).await?;

    println!();
    println!("{} Signed in as {} <{}>", "✓".green(), user.display_name.bold(), user.email);
    println!("  Session saved to {}", ctx.store_path.display().to_string().dimmed());
    Ok(())
}
