use crate::{
    ReplyThenDelete,
    data::{PoiseContext, State},
};
use color_eyre::eyre::{Error, Result};
use itk_traits::ForwardRefToTracing;
use poise::{
    FrameworkError,
    serenity_prelude::{CreateEmbed, CreateMessage, Mentionable, MessageId},
};
use std::time::Duration;

const REPLY_LIFETIME: Duration = Duration::from_secs(13);
/// Discord rejects embed field values longer than this.
const EMBED_FIELD_LIMIT: usize = 1024;

/// What went wrong, as far as the person who ran the command is concerned.
#[derive(Debug, Clone, PartialEq)]
enum ErrorCategory {
    CommandFailed,
    Panicked,
    BadArgument { input: Option<String> },
    MissingSubcommand,
    Cooldown { remaining: Duration },
    UserMissingPermissions,
    BotMissingPermissions,
    NotOwner,
    GuildOnly,
    DmOnly,
    NsfwOnly,
    CheckFailed,
}

impl ErrorCategory {
    /// Sorts a framework error into a category, with the details for the error report.
    fn classify(error: &FrameworkError<'_, State, Error>) -> Option<(Self, String)> {
        let classified = match error {
            FrameworkError::Command { error, .. } => (Self::CommandFailed, format!("{error:#}")),
            FrameworkError::CommandPanic { payload, .. } => (
                Self::Panicked,
                payload.clone().unwrap_or_else(|| "unknown panic".to_owned()),
            ),
            FrameworkError::ArgumentParse { error, input, .. } => (
                Self::BadArgument {
                    input: input.clone(),
                },
                error.to_string(),
            ),
            FrameworkError::SubcommandRequired { .. } => {
                (Self::MissingSubcommand, "no subcommand given".to_owned())
            }
            FrameworkError::CooldownHit {
                remaining_cooldown, ..
            } => (
                Self::Cooldown {
                    remaining: *remaining_cooldown,
                },
                format!("{:.2}s left", remaining_cooldown.as_secs_f64()),
            ),
            FrameworkError::MissingUserPermissions {
                missing_permissions,
                ..
            } => (
                Self::UserMissingPermissions,
                format!("{missing_permissions:?}"),
            ),
            FrameworkError::MissingBotPermissions {
                missing_permissions,
                ..
            } => (
                Self::BotMissingPermissions,
                format!("{missing_permissions:?}"),
            ),
            FrameworkError::NotAnOwner { .. } => (Self::NotOwner, "not an owner".to_owned()),
            FrameworkError::GuildOnly { .. } => (Self::GuildOnly, "used in a DM".to_owned()),
            FrameworkError::DmOnly { .. } => (Self::DmOnly, "used in a guild".to_owned()),
            FrameworkError::NsfwOnly { .. } => (Self::NsfwOnly, "used outside NSFW".to_owned()),
            FrameworkError::CommandCheckFailed { error, .. } => (
                Self::CheckFailed,
                error
                    .as_ref()
                    .map_or_else(|| "check returned false".to_owned(), |e| format!("{e:#}")),
            ),
            _ => return None,
        };

        Some(classified)
    }

    fn name(&self) -> &'static str {
        match self {
            Self::CommandFailed => "CommandFailed",
            Self::Panicked => "Panicked",
            Self::BadArgument { .. } => "BadArgument",
            Self::MissingSubcommand => "MissingSubcommand",
            Self::Cooldown { .. } => "Cooldown",
            Self::UserMissingPermissions => "UserMissingPermissions",
            Self::BotMissingPermissions => "BotMissingPermissions",
            Self::NotOwner => "NotOwner",
            Self::GuildOnly => "GuildOnly",
            Self::DmOnly => "DmOnly",
            Self::NsfwOnly => "NsfwOnly",
            Self::CheckFailed => "CheckFailed",
        }
    }

    /// Failures of the bot itself, rather than of the person using it.
    fn is_bug(&self) -> bool {
        matches!(self, Self::CommandFailed | Self::Panicked)
    }

    fn reply(&self, prefix: &str) -> String {
        match self {
            Self::CommandFailed | Self::Panicked => {
                "Something broke while running that, it has been reported".to_owned()
            }
            Self::BadArgument { input: Some(input) } => {
                format!("I couldn't make sense of `{input}`, check `{prefix}help`")
            }
            Self::BadArgument { input: None } => {
                format!("Looks like you left something out, check `{prefix}help`")
            }
            Self::MissingSubcommand => {
                format!("That command needs a subcommand, check `{prefix}help`")
            }
            Self::Cooldown { remaining } => {
                format!(
                    "That command is still on cooldown | {:.2}s",
                    remaining.as_secs_f64()
                )
            }
            Self::UserMissingPermissions => {
                "**You** don't have the permissions to run that command".to_owned()
            }
            Self::BotMissingPermissions => {
                "**I** don't have the permissions to run that command".to_owned()
            }
            Self::NotOwner => "Only the owner can use this command".to_owned(),
            Self::GuildOnly => "This command **can't** be used in direct messages".to_owned(),
            Self::DmOnly => "This command can **only** be used in direct messages".to_owned(),
            Self::NsfwOnly => "Not in here, find an NSFW channel".to_owned(),
            Self::CheckFailed => "You can't use this command right now".to_owned(),
        }
    }

    /// Cooldown replies go away once the cooldown is over.
    fn reply_lifetime(&self) -> Duration {
        match self {
            Self::Cooldown { remaining } => *remaining,
            _ => REPLY_LIFETIME,
        }
    }
}

pub async fn on_error(error: FrameworkError<'_, State, Error>) {
    match error {
        FrameworkError::Setup { error, .. } => {
            tracing::error!("Failed to set up the bot: {:?}", error);
        }
        FrameworkError::EventHandler { error, event, .. } => {
            tracing::error!(
                "Unhandled error in {} event: {:?}",
                event.snake_case_name(),
                error
            );
        }
        FrameworkError::UnknownCommand { .. } => {}
        error => {
            let (Some(ctx), Some((category, detail))) =
                (error.ctx(), ErrorCategory::classify(&error))
            else {
                tracing::error!("{}", error);
                return;
            };

            handle_command_error(ctx, category, detail).await;
        }
    }
}

async fn handle_command_error(ctx: PoiseContext<'_>, category: ErrorCategory, detail: String) {
    let link = MessageId::new(ctx.id()).link(ctx.channel_id(), ctx.guild_id());

    if category.is_bug() {
        tracing::error!(
            "Error running `{}` for {}: {} ({}) {}",
            ctx.command().qualified_name,
            ctx.author().tag(),
            ctx.invocation_string(),
            link,
            detail
        );
    } else {
        tracing::debug!(
            "{} on `{}` for {}: {}",
            category.name(),
            ctx.command().qualified_name,
            ctx.author().tag(),
            detail
        );
    }

    report(ctx, &category, &detail).await.trace_err_ok();

    ctx.reply_then_delete(category.reply(ctx.prefix()), category.reply_lifetime())
        .await
        .trace_err_ok();
    ctx.delete_invocation_after(REPLY_LIFETIME);
}

/// Posts the error to the log channel, pinging the owner.
async fn report(ctx: PoiseContext<'_>, category: &ErrorCategory, detail: &str) -> Result<()> {
    let (owner_id, log_channel_id) = {
        let config = ctx.data().config.read().await;
        (config.owner_id, config.log_channel_id)
    };

    let Some(log_channel_id) = log_channel_id else {
        return Ok(());
    };

    let author = ctx.author();
    let embed = CreateEmbed::new()
        .title(format!("{}{}", ctx.prefix(), ctx.command().qualified_name))
        .description(format!("{} | `{}`", author.tag(), author.id))
        .thumbnail(author.face())
        .field(category.name(), truncate_field(detail), true);

    let mut message = CreateMessage::new().embed(embed);

    if let Some(owner_id) = owner_id {
        message = message.content(owner_id.mention().to_string());
    }

    log_channel_id.send_message(ctx, message).await?;

    Ok(())
}

fn truncate_field(detail: &str) -> String {
    if detail.is_empty() {
        return "-".to_owned();
    }

    if detail.chars().count() <= EMBED_FIELD_LIMIT {
        return detail.to_owned();
    }

    let mut truncated: String = detail.chars().take(EMBED_FIELD_LIMIT - 1).collect();
    truncated.push('…');
    truncated
}
