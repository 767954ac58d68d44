use chrono::{DateTime, TimeDelta, Utc};
use poise::serenity_prelude::MessageId;

/// First millisecond of 2015, where discord snowflakes start counting.
const DISCORD_EPOCH_MS: u64 = 1_420_070_400_000;
const SNOWFLAKE_TIMESTAMP_SHIFT: u32 = 22;

/// The smallest message id that could have been created at `time`.
///
/// Pass it to `GetMessages::after` to read everything sent since then.
pub fn snowflake_floor(time: DateTime<Utc>) -> MessageId {
    let millis = u64::try_from(time.timestamp_millis())
        .unwrap_or(0)
        .saturating_sub(DISCORD_EPOCH_MS);

    MessageId::new((millis << SNOWFLAKE_TIMESTAMP_SHIFT).max(1))
}

/// `HH:MM:SS`, hours keep counting past a day.
pub fn format_elapsed(elapsed: TimeDelta) -> String {
    let total = elapsed.num_seconds().max(0);
    let (hours, rest) = (total / 3600, total % 3600);

    format!("{:02}:{:02}:{:02}", hours, rest / 60, rest % 60)
}
