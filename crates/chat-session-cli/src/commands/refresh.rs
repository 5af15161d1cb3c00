// `chat-session refresh` — rotate the token pair.

use colored::Colorize;

use super::{CommandResult, Context};

pub async fn run(ctx: &Context) -> CommandResult {
    if !ctx.session.is_authenticated() {
        println!("{}", "Not signed in.".dimmed());
        return Ok(());
    }

    ctx.session.try_refresh().await?;
    println!("{} Tokens refreshed.", "✓".green());
    Ok(())
}
