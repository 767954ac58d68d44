//! Reading and wiping channel history in discord sized pieces.

use poise::serenity_prelude::{ChannelId, Http, MessageId};
use std::slice::Chunks;

/// Discord caps both history pages and bulk deletes at 100 messages.
pub const BATCH_SIZE: u8 = 100;

/// Whether a page of this length could have more history behind it.
pub fn page_is_full(page_len: usize) -> bool {
    page_len >= usize::from(BATCH_SIZE)
}

/// Splits ids into the largest batches a single bulk delete accepts.
pub fn delete_batches(message_ids: &[MessageId]) -> Chunks<'_, MessageId> {
    message_ids.chunks(usize::from(BATCH_SIZE))
}

/// Deletes messages in bulk, falling back to one by one for a batch discord refuses
/// (anything older than two weeks, or a batch of one). Returns how many are gone.
pub async fn delete_messages(
    http: &Http,
    channel_id: ChannelId,
    message_ids: &[MessageId],
) -> usize {
    let mut deleted = 0;

    for batch in delete_batches(message_ids) {
        let bulk = match batch {
            [single] => channel_id.delete_message(http, *single).await,
            batch => channel_id.delete_messages(http, batch).await,
        };

        match bulk {
            Ok(()) => deleted += batch.len(),
            Err(e) => {
                tracing::warn!(
                    "Bulk delete of {} messages in {channel_id} failed, deleting one by one: {e}",
                    batch.len()
                );

                for message_id in batch {
                    match channel_id.delete_message(http, *message_id).await {
                        Ok(()) => deleted += 1,
                        Err(e) => tracing::warn!("Could not delete {message_id}: {e}"),
                    }
                }
            }
        }
    }

    deleted
}

#[cfg(test)]
mod test {
    use super::*;

    fn ids(count: u64) -> Vec<MessageId> {
        (1..=count).map(MessageId::new).collect()
    }

    #[test]
    fn deletes_go_out_in_batches_of_a_hundred() {
        let ids = ids(250);
        let sizes: Vec<usize> = delete_batches(&ids).map(<[MessageId]>::len).collect();

        assert_eq!(sizes, [100, 100, 50]);
        assert_eq!(delete_batches(&ids).next().unwrap()[0], MessageId::new(1));
        assert_eq!(delete_batches(&[]).count(), 0);
    }

    #[test]
    fn only_full_pages_have_more_behind_them() {
        assert!(page_is_full(100));
        assert!(!page_is_full(99));
        assert!(!page_is_full(0));
    }
}
