use crate::{ReplyThenDelete, data::PoiseContext};
use color_eyre::eyre::Result;
use itertools::Itertools;
use poise::{
    CreateReply,
    serenity_prelude::{Colour, CreateEmbed, ReactionType},
};
use std::{fmt, time::Duration};

const REPLY_LIFETIME: Duration = Duration::from_secs(7);

#[derive(Debug, PartialEq, Eq)]
enum PollProblem {
    NoOptions,
    TooManyOptions { max: usize },
}

impl fmt::Display for PollProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollProblem::NoOptions => write!(f, "You didn't give the poll any options"),
            PollProblem::TooManyOptions { max } => {
                write!(f, "A poll can only have {max} options")
            }
        }
    }
}

/// One `{reaction} {option}` line per option.
fn poll_description(options: &[String], reactions: &[String]) -> Result<String, PollProblem> {
    if options.is_empty() {
        return Err(PollProblem::NoOptions);
    }

    if options.len() > reactions.len() {
        return Err(PollProblem::TooManyOptions {
            max: reactions.len(),
        });
    }

    Ok(reactions
        .iter()
        .zip(options)
        .map(|(reaction, option)| format!("{reaction} {option}"))
        .join("\n"))
}

/// Start a poll, everyone votes with reactions
#[poise::command(prefix_command, aliases("vote"))]
pub async fn poll(
    ctx: PoiseContext<'_>,
    #[description = "What the poll is about"] title: String,
    #[description = "What people can vote for"] options: Vec<String>,
) -> Result<()> {
    let reactions = ctx.data().config.read().await.poll_reactions.clone();

    let description = match poll_description(&options, &reactions) {
        Ok(description) => description,
        Err(problem) => {
            ctx.reply_then_delete(problem.to_string(), REPLY_LIFETIME)
                .await?;
            ctx.delete_invocation_after(REPLY_LIFETIME);

            return Ok(());
        }
    };

    let poll = ctx
        .send(
            CreateReply::default().content(title).embed(
                CreateEmbed::new()
                    .description(description)
                    .colour(Colour::TEAL),
            ),
        )
        .await?
        .into_message()
        .await?;

    for reaction in reactions.into_iter().take(options.len()) {
        poll.react(ctx, ReactionType::try_from(reaction)?).await?;
    }

    Ok(())
}
