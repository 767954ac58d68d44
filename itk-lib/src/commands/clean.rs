use crate::{
    ReplyThenDelete,
    data::PoiseContext,
    history::{self, BATCH_SIZE, page_is_full},
    utils::format_elapsed,
};
use chrono::{DateTime, TimeDelta, Utc};
use color_eyre::eyre::Result;
use itk_traits::ForwardRefToTracing;
use poise::serenity_prelude::{
    CacheHttp, GetMessages, Member, Message, MessageId, ReactionType, UserId,
};
use std::time::Duration;

const CONFIRM: &str = "✅";
const CANCEL: &str = "❌";
/// How long the invoker has to react to the confirmation.
const CONFIRM_TIMEOUT: Duration = Duration::from_secs(10);
/// How long results, and the command itself, stay around.
const REPLY_LIFETIME: Duration = Duration::from_secs(15);

/// Which command was used. `clean` only ever touches the bot's own messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Invocation {
    Clean,
    Purge,
}

/// How far back to go, as typed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Request {
    Days(i64),
    Amount(i64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Target {
    id: UserId,
    name: String,
}

/// Whose messages get deleted, `None` meaning everyone's.
///
/// Only moderators going through `purge` get to pick, everything else falls back to the bot.
fn resolve_target(
    invocation: Invocation,
    is_moderator: bool,
    member: Option<Target>,
    me: Target,
) -> Option<Target> {
    match invocation {
        Invocation::Purge if is_moderator => member,
        _ => Some(me),
    }
}

fn whose(target: Option<&Target>) -> String {
    target.map_or_else(|| "**anyone**".to_owned(), |target| format!("**{}**", target.name))
}

fn confirmation_prompt(request: Request, target: Option<&Target>) -> String {
    match request {
        Request::Days(1) => {
            format!("Clean every message from {} in the last day?", whose(target))
        }
        Request::Days(days) => format!(
            "Clean every message from {} in the last {days} days?",
            whose(target)
        ),
        Request::Amount(amount) => {
            format!("Clean the last {amount} messages from {}?", whose(target))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Answer {
    Confirmed,
    Cancelled,
}

impl Answer {
    fn from_emoji(emoji: &ReactionType) -> Option<Self> {
        if emoji.unicode_eq(CONFIRM) {
            Some(Self::Confirmed)
        } else if emoji.unicode_eq(CANCEL) {
            Some(Self::Cancelled)
        } else {
            None
        }
    }
}

/// When the oldest message to delete may have been sent. Days past what a date can hold
/// reach back to the beginning of time.
fn since(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    TimeDelta::try_days(days)
        .and_then(|span| span.checked_add(&TimeDelta::seconds(1)))
        .and_then(|span| now.checked_sub_signed(span))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Limit {
    Since(DateTime<Utc>),
    Count(usize),
}

#[derive(Debug, Clone, Copy)]
struct HistoryEntry {
    id: MessageId,
    author: UserId,
    sent_at: DateTime<Utc>,
}

impl From<&Message> for HistoryEntry {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id,
            author: message.author.id,
            sent_at: *message.timestamp,
        }
    }
}

/// Collects the messages to delete from history pages read newest first.
#[derive(Debug)]
struct Sweep {
    author: Option<UserId>,
    limit: Limit,
    found: Vec<MessageId>,
}

impl Sweep {
    fn new(author: Option<UserId>, limit: Limit) -> Self {
        Self {
            author,
            limit,
            found: vec![],
        }
    }

    /// Returns the message to read the next page before, or `None` when the sweep is done.
    fn scan_page(&mut self, page: &[HistoryEntry]) -> Option<MessageId> {
        for entry in page {
            if let Limit::Count(count) = self.limit {
                if self.found.len() >= count {
                    return None;
                }
            }

            if let Limit::Since(since) = self.limit {
                if entry.sent_at <= since {
                    return None;
                }
            }

            if self.author.is_none_or(|author| author == entry.author) {
                self.found.push(entry.id);
            }
        }

        if let Limit::Count(count) = self.limit {
            if self.found.len() >= count {
                return None;
            }
        }

        if !page_is_full(page.len()) {
            return None;
        }

        page.iter().map(|entry| entry.id).min()
    }
}

/// Delete the bot's messages from the last few days
#[poise::command(
    prefix_command,
    guild_only,
    required_bot_permissions = "MANAGE_MESSAGES",
    subcommands("clean_by_days", "clean_by_amounts")
)]
pub async fn clean(
    ctx: PoiseContext<'_>,
    #[description = "How many days back to clean"] days: Option<i64>,
) -> Result<()> {
    run(ctx, Invocation::Clean, Request::Days(days.unwrap_or(1)), None).await
}

/// Delete the bot's messages from the last few days
#[poise::command(
    prefix_command,
    rename = "by_days",
    aliases("by_day", "days", "day", "d"),
    guild_only,
    required_bot_permissions = "MANAGE_MESSAGES"
)]
async fn clean_by_days(ctx: PoiseContext<'_>, days: Option<i64>) -> Result<()> {
    run(ctx, Invocation::Clean, Request::Days(days.unwrap_or(1)), None).await
}

/// Delete the bot's last few messages
#[poise::command(
    prefix_command,
    rename = "by_amounts",
    aliases("by_amount", "amounts", "amount", "a"),
    guild_only,
    required_bot_permissions = "MANAGE_MESSAGES"
)]
async fn clean_by_amounts(ctx: PoiseContext<'_>, amounts: Option<i64>) -> Result<()> {
    run(ctx, Invocation::Clean, Request::Amount(amounts.unwrap_or(1)), None).await
}

/// Delete recent messages. Moderators can pick a member, or leave it out for everyone
#[poise::command(
    prefix_command,
    guild_only,
    required_bot_permissions = "MANAGE_MESSAGES",
    subcommands("purge_by_days", "purge_by_amounts")
)]
pub async fn purge(
    ctx: PoiseContext<'_>,
    #[description = "How many days back to purge"] days: Option<i64>,
) -> Result<()> {
    run(ctx, Invocation::Purge, Request::Days(days.unwrap_or(1)), None).await
}

/// Delete messages from the last few days
#[poise::command(
    prefix_command,
    rename = "by_days",
    aliases("by_day", "days", "day", "d"),
    guild_only,
    required_bot_permissions = "MANAGE_MESSAGES"
)]
async fn purge_by_days(
    ctx: PoiseContext<'_>,
    #[description = "How many days back to purge"] days: Option<i64>,
    #[description = "Whose messages, everyone's if left out"] member: Option<Member>,
) -> Result<()> {
    run(ctx, Invocation::Purge, Request::Days(days.unwrap_or(1)), member).await
}

/// Delete the last few messages
#[poise::command(
    prefix_command,
    rename = "by_amounts",
    aliases("by_amount", "amounts", "amount", "a"),
    guild_only,
    required_bot_permissions = "MANAGE_MESSAGES"
)]
async fn purge_by_amounts(
    ctx: PoiseContext<'_>,
    #[description = "How many messages to purge"] amounts: Option<i64>,
    #[description = "Whose messages, everyone's if left out"] member: Option<Member>,
) -> Result<()> {
    run(
        ctx,
        Invocation::Purge,
        Request::Amount(amounts.unwrap_or(1)),
        member,
    )
    .await
}

async fn run(
    ctx: PoiseContext<'_>,
    invocation: Invocation,
    request: Request,
    member: Option<Member>,
) -> Result<()> {
    ctx.delete_invocation_after(REPLY_LIFETIME);

    let limit = match request {
        Request::Days(days) if days > 0 => Limit::Since(since(*ctx.created_at(), days)),
        Request::Amount(amount) if amount > 0 => {
            Limit::Count(usize::try_from(amount).unwrap_or(usize::MAX))
        }
        _ => {
            ctx.reply_then_delete("That needs a number above 0", REPLY_LIFETIME)
                .await?;
            return Ok(());
        }
    };

    let is_moderator = ctx
        .data()
        .config
        .read()
        .await
        .moderators
        .contains(&ctx.author().id);

    let me = {
        let me = ctx.serenity_context().cache.current_user();
        Target {
            id: me.id,
            name: me.name.clone(),
        }
    };

    let member = member.map(|member| Target {
        id: member.user.id,
        name: member.display_name().to_owned(),
    });

    let target = resolve_target(invocation, is_moderator, member, me);

    let confirm = ctx
        .reply(confirmation_prompt(request, target.as_ref()))
        .await?
        .into_message()
        .await?;

    for emoji in [CONFIRM, CANCEL] {
        confirm
            .react(ctx, ReactionType::Unicode(emoji.to_owned()))
            .await?;
    }

    let answer = confirm
        .await_reaction(ctx)
        .author_id(ctx.author().id)
        .timeout(CONFIRM_TIMEOUT)
        .filter(|reaction| Answer::from_emoji(&reaction.emoji).is_some())
        .await
        .and_then(|reaction| Answer::from_emoji(&reaction.emoji));

    confirm.delete(ctx).await.trace_warn_ok();

    match answer {
        None => {
            ctx.reply_then_delete("Timed out, command cancelled", REPLY_LIFETIME)
                .await?;
        }
        Some(Answer::Cancelled) => {
            ctx.reply_then_delete("Command cancelled", REPLY_LIFETIME)
                .await?;
        }
        Some(Answer::Confirmed) => {
            let started = Utc::now();
            let deleted = {
                let _typing = ctx
                    .channel_id()
                    .start_typing(&ctx.serenity_context().http);

                sweep(ctx, Sweep::new(target.as_ref().map(|t| t.id), limit)).await?
            };

            tracing::info!(
                "{} cleaned {deleted} messages from {} in {}",
                ctx.author().tag(),
                target.as_ref().map_or("everyone", |target| &target.name),
                ctx.channel_id()
            );

            ctx.reply_then_delete(
                format!(
                    "Cleaned {deleted} messages from {} | Time taken: {}",
                    whose(target.as_ref()),
                    format_elapsed(Utc::now() - started)
                ),
                REPLY_LIFETIME,
            )
            .await?;
        }
    }

    Ok(())
}

/// Reads history backwards from the command and deletes whatever the sweep picks.
async fn sweep(ctx: PoiseContext<'_>, mut sweep: Sweep) -> Result<usize> {
    let channel_id = ctx.channel_id();
    let mut before = MessageId::new(ctx.id());

    loop {
        let page: Vec<HistoryEntry> = channel_id
            .messages(ctx, GetMessages::new().before(before).limit(BATCH_SIZE))
            .await?
            .iter()
            .map(HistoryEntry::from)
            .collect();

        match sweep.scan_page(&page) {
            Some(next) => before = next,
            None => break,
        }
    }

    Ok(history::delete_messages(ctx.http(), channel_id, &sweep.found).await)
}
