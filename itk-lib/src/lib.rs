use color_eyre::eyre::Result;
use data::PoiseContext;
use itk_traits::ForwardRefToTracing;
use poise::serenity_prelude::{Cache, CacheHttp, Http};
use std::{sync::Arc, time::Duration};

pub mod ab_game;
pub mod commands;
pub mod config;
pub mod data;
pub mod error_handler;
pub mod event_handler;
mod history;
mod utils;

trait ReplyThenDelete {
    /// Replies, then deletes the reply after `delay` without blocking the command.
    async fn reply_then_delete(self, message: impl Into<String>, delay: Duration) -> Result<()>;

    /// Deletes the message that invoked the command after `delay`.
    ///
    /// Only done in guilds, the bot can't delete other people's direct messages.
    fn delete_invocation_after(self, delay: Duration);
}

impl ReplyThenDelete for PoiseContext<'_> {
    async fn reply_then_delete(self, message: impl Into<String>, delay: Duration) -> Result<()> {
        let reply = self.reply(message).await?.into_message().await?;
        let ctx = self.get_cloneable_ctx();

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            reply.delete(ctx).await.trace_warn_ok();
        });

        Ok(())
    }

    fn delete_invocation_after(self, delay: Duration) {
        let poise::Context::Prefix(prefix) = self else {
            return;
        };

        if prefix.msg.guild_id.is_none() {
            return;
        }

        let ctx = self.get_cloneable_ctx();
        let (channel_id, message_id) = (prefix.msg.channel_id, prefix.msg.id);

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            channel_id
                .delete_message(ctx.http(), message_id)
                .await
                .trace_warn_ok();
        });
    }
}

/// The parts of a context that can be moved into a spawned task.
struct CloneableCtx(Arc<Cache>, Arc<Http>);

trait IntoCloneableCtx {
    fn get_cloneable_ctx(self) -> CloneableCtx;
}

impl IntoCloneableCtx for &PoiseContext<'_> {
    fn get_cloneable_ctx(self) -> CloneableCtx {
        self.serenity_context().get_cloneable_ctx()
    }
}

impl IntoCloneableCtx for PoiseContext<'_> {
    fn get_cloneable_ctx(self) -> CloneableCtx {
        (&self).get_cloneable_ctx()
    }
}

impl IntoCloneableCtx for &poise::serenity_prelude::Context {
    fn get_cloneable_ctx(self) -> CloneableCtx {
        CloneableCtx(Arc::clone(&self.cache), Arc::clone(&self.http))
    }
}

impl CacheHttp for CloneableCtx {
    fn http(&self) -> &Http {
        &self.1
    }

    fn cache(&self) -> Option<&Arc<Cache>> {
        Some(&self.0)
    }
}

impl Clone for CloneableCtx {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0), Arc::clone(&self.1))
    }
}
