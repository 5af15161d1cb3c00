// `chat-session logout` / `logout-all` — clear the local session.

use colored::Colorize;

use super::{CommandResult, Context};

pub async fn run(ctx: &Context, everywhere: bool) -> CommandResult {
    let was_signed_in = ctx.session.is_authenticated();

    if everywhere {
        ctx.session.logout_all().await;
    } else {
        ctx.session.logout().await;
    }

    if was_signed_in {
        let scope = if everywhere { "on all devices" } else { "on this device" };
        println!("{} Signed out {}.", "✓".green(), scope);
    } else {
        println!("{}", "Not signed in.".dimmed());
    }
    Ok(())
}
