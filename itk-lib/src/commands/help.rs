use crate::data::PoiseContext;
use color_eyre::eyre::Result;

#[poise::command(prefix_command)]
pub async fn help(ctx: PoiseContext<'_>) -> Result<()> {
    let help_text = ctx.data().config.read().await.help_text.clone();

    match help_text {
        Some(help_text) => {
            ctx.say(&*help_text).await?;
        }
        None => {
            let prefix = ctx.prefix();

            ctx.say(format!(
                "`{prefix}ab start [length]` starts a guessing game, `{prefix}ab end` gives up.\n\
                 `{prefix}choose <options...>` picks one for you, \
                 `{prefix}poll <title> <options...>` starts a poll.\n\
                 `{prefix}clean [days]` and `{prefix}clean amount [count]` tidy up after me."
            ))
            .await?;
        }
    }

    Ok(())
}
