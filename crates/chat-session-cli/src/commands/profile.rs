// `chat-session profile` — update the signed-in user's profile.

use chat_session::ProfileUpdate;
use clap::Args;
use colored::Colorize;

use super::{CommandResult, Context};

#[derive(Args)]
pub struct ProfileArgs {
    /// New display name
    #[arg(long)]
    display_name: Option<String>,

    /// New email address
    #[arg(long)]
    email: Option<String>,

    /// New avatar URL
    #[arg(long)]
    image_url: Option<String>,
}

impl From<ProfileArgs> for ProfileUpdate {
    fn from(args: ProfileArgs) -> Self {
        ProfileUpdate {
            email: args.email,
            display_name: args.display_name,
            profile_image_url: args.image_url,
        }
    }
}

pub async fn run(ctx: &Context, args: ProfileArgs) -> CommandResult {
    let update = ProfileUpdate::from(args);
    if update.is_empty() {
        return Err("nothing to update; pass --display-name, --email or --image-url".into());
    }

    let user = ctx.session.update_profile(update).await?;
    println!(
        "{} Profile updated: {} <{}>",
        "✓".green(),
        user.display_name.bold(),
        user.email
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_to_update() {
        let update = ProfileUpdate::from(ProfileArgs {
            display_name: Some("Renamed".into()),
            email: None,
            image_url: Some("https://cdn.example.com/a.png".into()),
        });
        assert_eq!(update.display_name.as_deref(), Some("Renamed"));
        assert!(update.email.is_none());
        assert_eq!(
            update.profile_image_url.as_deref(),
            Some("https://cdn.example.com/a.png")
        );
    }
}
