use crate::{ReplyThenDelete, data::PoiseContext};
use color_eyre::eyre::Result;
use poise::serenity_prelude::CreateMessage;
use rand::{Rng, seq::IndexedRandom};
use std::time::Duration;

/// Let the bot pick one of your options. The answer arrives in your DMs.
#[poise::command(prefix_command, aliases("ch"))]
pub async fn choose(
    ctx: PoiseContext<'_>,
    #[description = "What to choose from"] choices: Vec<String>,
) -> Result<()> {
    ctx.delete_invocation_after(Duration::from_secs(3));

    let choice = pick(&choices, &mut rand::rng()).cloned();

    let Some(choice) = choice else {
        ctx.reply_then_delete("You didn't give me anything to choose from", Duration::from_secs(5))
            .await?;

        return Ok(());
    };

    ctx.author()
        .dm(ctx, CreateMessage::new().content(choice))
        .await?;

    Ok(())
}

fn pick<'a>(choices: &'a [String], rng: &mut impl Rng) -> Option<&'a String> {
    choices.choose(rng)
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    #[test]
    fn nothing_to_pick() {
        assert_eq!(pick(&[], &mut StdRng::seed_from_u64(0)), None);
    }

    #[test]
    fn picks_one_of_the_options() {
        let choices = ["ramen", "curry", "hotpot"].map(str::to_owned);
        let mut rng = StdRng::seed_from_u64(5);

        for _ in 0..50 {
            let choice = pick(&choices, &mut rng).unwrap();
            assert!(choices.contains(choice));
        }
    }
}
