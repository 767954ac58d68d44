use crate::{
    CloneableCtx, IntoCloneableCtx, ReplyThenDelete,
    ab_game::{
        Cleanup, DEFAULT_SECRET_LENGTH, Finished, GuessOutcome, MAX_SECRET_LENGTH,
        MIN_SECRET_LENGTH, StartOutcome,
    },
    data::{PoiseContext, State},
    history::{self, BATCH_SIZE, page_is_full},
    utils::{format_elapsed, snowflake_floor},
};
use ahash::AHashSet;
use chrono::Utc;
use color_eyre::eyre::{Result, WrapErr};
use itk_traits::ForwardRefToTracing;
use poise::serenity_prelude::{
    self as serenity, CacheHttp, GetMessages, Mentionable, Message, MessageId,
};
use std::{fmt::Display, num::IntErrorKind, time::Duration};

/// How long replies about bad commands, and the commands themselves, stay around.
const REPLY_LIFETIME: Duration = Duration::from_secs(7);
/// Grace period between the end of a game and wiping its messages.
const CLEANUP_DELAY: Duration = Duration::from_secs(5);

/// Guess the secret digits. `A` is a right digit in the right place, `B` a right digit in
/// the wrong place.
#[poise::command(prefix_command, subcommands("start", "end"), subcommand_required)]
pub async fn ab(_ctx: PoiseContext<'_>) -> Result<()> {
    Ok(())
}

/// Start a game in this channel
#[poise::command(prefix_command, aliases("s"))]
pub async fn start(
    ctx: PoiseContext<'_>,
    #[description = "How many digits the secret has, 1 to 10"] answer_length: Option<String>,
) -> Result<()> {
    start_game(ctx, answer_length).await
}

/// Give up and reveal the secret
#[poise::command(prefix_command, aliases("e"))]
pub async fn end(ctx: PoiseContext<'_>) -> Result<()> {
    end_game(ctx).await
}

#[poise::command(prefix_command, aliases("ab_s"), hide_in_help)]
pub async fn ab_start(ctx: PoiseContext<'_>, answer_length: Option<String>) -> Result<()> {
    start_game(ctx, answer_length).await
}

#[poise::command(prefix_command, aliases("ab_e"), hide_in_help)]
pub async fn ab_end(ctx: PoiseContext<'_>) -> Result<()> {
    end_game(ctx).await
}

/// The length as typed. Numbers past what an `i64` holds saturate, they are out of range
/// either way. `None` when it isn't a number at all.
fn requested_length(answer_length: Option<&str>) -> Option<i64> {
    let Some(raw) = answer_length else {
        return Some(DEFAULT_SECRET_LENGTH);
    };

    match raw.parse::<i64>() {
        Ok(length) => Some(length),
        Err(e) => match e.kind() {
            IntErrorKind::PosOverflow => Some(i64::MAX),
            IntErrorKind::NegOverflow => Some(i64::MIN),
            _ => None,
        },
    }
}

async fn start_game(ctx: PoiseContext<'_>, answer_length: Option<String>) -> Result<()> {
    let channel_id = ctx.channel_id();
    let arrived_at = *ctx.created_at();

    let Some(answer_length) = requested_length(answer_length.as_deref()) else {
        ctx.reply_then_delete(
            format!(
                "The secret length is a number of digits, {MIN_SECRET_LENGTH} to {MAX_SECRET_LENGTH}"
            ),
            REPLY_LIFETIME,
        )
        .await?;
        ctx.delete_invocation_after(REPLY_LIFETIME);

        return Ok(());
    };

    let outcome = {
        let mut games = ctx.data().ab_games.lock();
        games.start(channel_id, answer_length, arrived_at, &mut rand::rng())
    };

    match outcome {
        StartOutcome::InvalidLength => {
            ctx.reply_then_delete(
                format!(
                    "The secret must be between {MIN_SECRET_LENGTH} and {MAX_SECRET_LENGTH} digits long"
                ),
                REPLY_LIFETIME,
            )
            .await?;
        }
        StartOutcome::AlreadyActive => {
            tracing::debug!("A/B game already running in {channel_id}");
        }
        StartOutcome::Started { secret_length } => {
            tracing::info!(
                "{} started a {secret_length} digit A/B game in {channel_id}",
                ctx.author().tag()
            );

            let prompt = ctx
                .say(format!("Enter {secret_length} distinct digits"))
                .await?
                .into_message()
                .await?;

            ctx.data()
                .ab_games
                .lock()
                .track_messages(channel_id, [prompt.id]);
        }
    }

    ctx.delete_invocation_after(REPLY_LIFETIME);

    Ok(())
}

async fn end_game(ctx: PoiseContext<'_>) -> Result<()> {
    let channel_id = ctx.channel_id();
    let finished = ctx.data().ab_games.lock().end(channel_id, Utc::now());

    match finished {
        None => {
            ctx.reply_then_delete("There's no game running in this channel", REPLY_LIFETIME)
                .await?;
        }
        Some(Finished {
            secret,
            elapsed,
            cleanup,
        }) => {
            tracing::info!("{} ended the A/B game in {channel_id}", ctx.author().tag());

            schedule_cleanup(ctx.get_cloneable_ctx(), cleanup, ctx.guild_id().is_some());

            ctx.reply(format!(
                "{} ended the game!\nThe answer was **{secret}**! | Game time: {}",
                ctx.author().mention(),
                format_elapsed(elapsed)
            ))
            .await?;
        }
    }

    ctx.delete_invocation_after(REPLY_LIFETIME);

    Ok(())
}

/// Treats any message in a channel with a running game as a guess.
pub async fn handle_guess(ctx: &serenity::Context, data: &State, message: &Message) -> Result<()> {
    let channel_id = message.channel_id;
    let in_guild = message.guild_id.is_some();
    let outcome = data.ab_games.lock().submit_guess(
        channel_id,
        &message.content,
        message.author.bot,
        Utc::now(),
    );

    let Some(outcome) = outcome else {
        return Ok(());
    };

    if let GuessOutcome::Solved { finished, .. } = &outcome {
        tracing::info!(
            "{} solved the A/B game in {channel_id} after {}",
            message.author.tag(),
            format_elapsed(finished.elapsed)
        );

        schedule_cleanup(ctx.get_cloneable_ctx(), finished.cleanup.clone(), in_guild);
    }

    let reply = message
        .reply(
            ctx,
            guess_reply(&outcome, &message.content, message.author.mention()),
        )
        .await?;

    let tracked = ids_to_track(&outcome, reply.id, message.id, in_guild);

    if !tracked.is_empty() && !data.ab_games.lock().track_messages(channel_id, tracked) {
        tracing::debug!("A/B game in {channel_id} ended before its reply was tracked");
    }

    Ok(())
}

fn guess_reply(outcome: &GuessOutcome, guess: &str, author: impl Display) -> String {
    match outcome {
        GuessOutcome::Repeated { secret_length } => {
            format!("Don't repeat digits! | Secret length: {secret_length}")
        }
        GuessOutcome::Partial {
            score,
            secret_length,
        } => format!("({guess}): **{score}** | Secret length: {secret_length}"),
        GuessOutcome::Solved { score, finished } => format!(
            "({guess}): **{score}**\nCongrats {author}, you got it! | Game time: {}",
            format_elapsed(finished.elapsed)
        ),
    }
}

/// Messages a guess leaves behind for the game's cleanup.
///
/// Only scored guesses of a running game are kept. The repeated digit warning stays in the
/// channel, and a solved game has already taken its snapshot.
fn ids_to_track(
    outcome: &GuessOutcome,
    reply: MessageId,
    guess: MessageId,
    in_guild: bool,
) -> Vec<MessageId> {
    match outcome {
        GuessOutcome::Partial { .. } if in_guild => vec![reply, guess],
        GuessOutcome::Partial { .. } => vec![reply],
        GuessOutcome::Repeated { .. } | GuessOutcome::Solved { .. } => vec![],
    }
}

/// Deletes a finished game's messages after [`CLEANUP_DELAY`].
///
/// Runs on its own snapshot, so a new game started in the meantime is left alone.
fn schedule_cleanup(ctx: CloneableCtx, cleanup: Cleanup, in_guild: bool) {
    tokio::spawn(async move {
        tokio::time::sleep(CLEANUP_DELAY).await;

        let channel_id = cleanup.channel_id;
        let result = if in_guild {
            purge_tracked(ctx, cleanup).await
        } else {
            delete_tracked(ctx, cleanup).await
        };

        result
            .wrap_err_with(|| format!("Failed to clean up the A/B game in {channel_id}"))
            .trace_err_ok();
    });
}

/// Picks a game's tracked messages out of history pages read oldest first.
#[derive(Debug)]
struct TrackedScan {
    tracked: AHashSet<MessageId>,
    found: Vec<MessageId>,
}

impl TrackedScan {
    fn new(message_ids: impl IntoIterator<Item = MessageId>) -> Self {
        let tracked: AHashSet<_> = message_ids.into_iter().collect();

        Self {
            found: Vec::with_capacity(tracked.len()),
            tracked,
        }
    }

    fn is_complete(&self) -> bool {
        self.found.len() >= self.tracked.len()
    }

    /// Takes the tracked ids out of a page. Returns where the next page starts, or `None` once
    /// everything was found or the history ran out.
    fn scan_page(&mut self, page: &[MessageId]) -> Option<MessageId> {
        self.found
            .extend(page.iter().copied().filter(|id| self.tracked.contains(id)));

        if self.is_complete() || !page_is_full(page.len()) {
            return None;
        }

        page.iter().max().copied()
    }
}

/// Walks the channel history since the game started and bulk deletes the tracked messages.
async fn purge_tracked(
    ctx: CloneableCtx,
    Cleanup {
        channel_id,
        started_at,
        message_ids,
    }: Cleanup,
) -> Result<()> {
    let mut scan = TrackedScan::new(message_ids);
    let mut after = snowflake_floor(started_at);

    while !scan.is_complete() {
        let page: Vec<MessageId> = channel_id
            .messages(ctx.clone(), GetMessages::new().after(after).limit(BATCH_SIZE))
            .await?
            .iter()
            .map(|message| message.id)
            .collect();

        match scan.scan_page(&page) {
            Some(next) => after = next,
            None => break,
        }
    }

    tracing::debug!("Purging {} A/B messages from {channel_id}", scan.found.len());

    let deleted = history::delete_messages(ctx.http(), channel_id, &scan.found).await;

    if deleted < scan.found.len() {
        tracing::warn!(
            "Only deleted {deleted} of {} A/B messages in {channel_id}",
            scan.found.len()
        );
    }

    Ok(())
}

/// Direct messages have no bulk delete, so every tracked message goes on its own.
async fn delete_tracked(ctx: CloneableCtx, cleanup: Cleanup) -> Result<()> {
    tracing::debug!(
        "Deleting {} A/B messages from {}",
        cleanup.message_ids.len(),
        cleanup.channel_id
    );

    for message_id in cleanup.message_ids {
        cleanup
            .channel_id
            .delete_message(ctx.http(), message_id)
            .await
            .trace_warn_ok();
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ab_game::Score;
    use chrono::{DateTime, TimeDelta};
    use poise::serenity_prelude::ChannelId;

    fn reply() -> MessageId {
        MessageId::new(20)
    }

    fn guess() -> MessageId {
        MessageId::new(10)
    }

    fn partial() -> GuessOutcome {
        GuessOutcome::Partial {
            score: Score {
                exact: 1,
                partial: 2,
            },
            secret_length: 4,
        }
    }

    fn solved() -> GuessOutcome {
        GuessOutcome::Solved {
            score: Score {
                exact: 4,
                partial: 0,
            },
            finished: Finished {
                secret: "1234".to_owned(),
                elapsed: TimeDelta::seconds(75),
                cleanup: Cleanup {
                    channel_id: ChannelId::new(1),
                    started_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
                    message_ids: vec![],
                },
            },
        }
    }

    fn ids(range: std::ops::RangeInclusive<u64>) -> Vec<MessageId> {
        range.map(MessageId::new).collect()
    }

    #[test]
    fn missing_length_uses_the_default() {
        assert_eq!(requested_length(None), Some(DEFAULT_SECRET_LENGTH));
        assert_eq!(requested_length(Some("6")), Some(6));
    }

    #[test]
    fn out_of_range_lengths_reach_the_length_check() {
        assert_eq!(requested_length(Some("-1")), Some(-1));
        assert_eq!(requested_length(Some("99999999999999999999")), Some(i64::MAX));
        assert_eq!(requested_length(Some("-99999999999999999999")), Some(i64::MIN));

        let mut games = crate::ab_game::AbGames::new();
        let mut rng = rand::rng();

        for typed in ["-1", "0", "11", "99999999999999999999"] {
            let length = requested_length(Some(typed)).unwrap();

            assert_eq!(
                games.start(ChannelId::new(1), length, Utc::now(), &mut rng),
                StartOutcome::InvalidLength
            );
        }
    }

    #[test]
    fn words_are_not_lengths() {
        assert_eq!(requested_length(Some("four")), None);
        assert_eq!(requested_length(Some("")), None);
        assert_eq!(requested_length(Some("4.5")), None);
    }

    #[test]
    fn guesses_are_only_tracked_in_guilds() {
        assert_eq!(
            ids_to_track(&partial(), reply(), guess(), true),
            [reply(), guess()]
        );
        assert_eq!(ids_to_track(&partial(), reply(), guess(), false), [reply()]);
    }

    #[test]
    fn repeated_warning_is_never_tracked() {
        let repeated = GuessOutcome::Repeated { secret_length: 4 };

        assert!(ids_to_track(&repeated, reply(), guess(), true).is_empty());
        assert!(ids_to_track(&repeated, reply(), guess(), false).is_empty());
        assert!(ids_to_track(&solved(), reply(), guess(), true).is_empty());
    }

    #[test]
    fn replies() {
        assert_eq!(
            guess_reply(&partial(), "1243", "@someone"),
            "(1243): **1A2B** | Secret length: 4"
        );
        assert_eq!(
            guess_reply(&GuessOutcome::Repeated { secret_length: 3 }, "112", "@someone"),
            "Don't repeat digits! | Secret length: 3"
        );
        assert_eq!(
            guess_reply(&solved(), "1234", "@someone"),
            "(1234): **4A0B**\nCongrats @someone, you got it! | Game time: 00:01:15"
        );
    }

    #[test]
    fn scan_stops_on_a_short_page() {
        let mut scan = TrackedScan::new([MessageId::new(5), MessageId::new(500)]);

        assert_eq!(scan.scan_page(&ids(1..=40)), None);
        assert_eq!(scan.found, [MessageId::new(5)]);
        assert!(!scan.is_complete());
    }

    #[test]
    fn scan_continues_after_the_newest_message_of_a_full_page() {
        let mut scan = TrackedScan::new([MessageId::new(5), MessageId::new(150)]);

        assert_eq!(scan.scan_page(&ids(1..=100)), Some(MessageId::new(100)));
        assert_eq!(scan.scan_page(&ids(101..=200)), None);
        assert_eq!(scan.found, [MessageId::new(5), MessageId::new(150)]);
        assert!(scan.is_complete());
    }

    #[test]
    fn scan_stops_once_everything_is_found() {
        let mut scan = TrackedScan::new([MessageId::new(3), MessageId::new(7)]);

        assert_eq!(scan.scan_page(&ids(1..=100)), None);
        assert!(scan.is_complete());
    }

    #[test]
    fn scan_stops_on_an_empty_page() {
        let mut scan = TrackedScan::new([MessageId::new(3)]);

        assert_eq!(scan.scan_page(&[]), None);
        assert!(scan.found.is_empty());
    }

    #[test]
    fn nothing_tracked_needs_no_history() {
        assert!(TrackedScan::new([]).is_complete());
    }
}
