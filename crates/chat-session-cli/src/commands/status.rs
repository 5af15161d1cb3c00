// `chat-session status` — show who is signed in.

use chat_session::{guard, RouteDecision};
use colored::Colorize;

use super::{CommandResult, Context};

pub async fn run(ctx: &Context) -> CommandResult {
    let state = ctx.session.state();

    println!();
    println!("{}", "Chat Session".bold());
    println!("  Gateway:  {}", ctx.api_url);
    println!("  Store:    {}", ctx.store_path.display());
    println!("  Phase:    {:?}", state.phase());

    match state.user {
        Some(ref user) => {
            println!("  User:     {} <{}>", user.display_name.bold(), user.email);
            println!("  User ID:  {}", user.id);
            if let Some(ref url) = user.profile_image_url {
                println!("  Avatar:   {}", url);
            }
            if let Some(ref created) = user.created_at {
                println!("  Joined:   {}", created);
            }
        }
        None => println!("  User:     {}", "(not signed in)".dimmed()),
    }

    match guard(&state) {
        RouteDecision::Allow => println!("  Access:   {}", "granted".green()),
        RouteDecision::RedirectToLogin => {
            println!("  Access:   {}", "sign in required".yellow())
        }
        RouteDecision::Pending => println!("  Access:   {}", "pending".dimmed()),
    }
    println!();
    Ok(())
}
