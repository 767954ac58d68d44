use crate::{commands::ab::handle_guess, data::State};
use color_eyre::eyre::{Error, Result};
use itk_traits::ForwardRefToTracing;
use poise::serenity_prelude as serenity;

pub async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, State, Error>,
    data: &State,
) -> Result<()> {
    match event {
        serenity::FullEvent::Ready { data_about_bot } => {
            tracing::info!("{} is ready", data_about_bot.user.name);
        }
        serenity::FullEvent::Message { new_message } => {
            handle_guess(ctx, data, new_message).await.trace_err_ok();
        }
        serenity::FullEvent::Ratelimit { data } => {
            tracing::warn!("Ratelimited: {:?}", data);
        }
        _ => {}
    };

    Ok(())
}
